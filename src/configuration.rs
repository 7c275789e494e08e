use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
///
/// Loaded once at startup and handed to the token codec and route handlers;
/// business logic never reads ambient environment state. Rotating the secret
/// invalidates every outstanding token.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 86400 for 24 hours)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Signing secret shipped as a development default.
/// Deployments must override it (`configuration` file or `APP__JWT__SECRET`).
pub const DEV_SECRET: &str = "dev-secret-change-me";

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.port", 8000)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.port", 5432)?
        .set_default("database.host", "127.0.0.1")?
        .set_default("database.database_name", "calc_api")?
        .set_default("jwt.secret", DEV_SECRET)?
        .set_default("jwt.access_token_expiry", 86_400)?
        .set_default("jwt.refresh_token_expiry", 604_800)?
        .set_default("jwt.issuer", "calc-api")?
        .add_source(config::File::with_name("configuration").required(false))
        // APP__JWT__SECRET=... overrides jwt.secret, etc.
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    settings.try_deserialize::<Settings>()
}
