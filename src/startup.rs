use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::middleware::JwtMiddleware;
use crate::request_logger::RequestLogger;
use crate::routes::{
    add, change_password, create_calculation, delete_calculation, divide, get_current_user,
    health_check, list_all_tokens, list_calculations, list_my_tokens, list_tokens_for_user,
    list_users, list_users_with_token_counts, login, logout, multiply, patch_calculation,
    read_calculation, refresh, register, revoke_all_tokens_for_user, revoke_my_token,
    revoke_my_token_by_string, revoke_token_by_string, set_user_role, subtract, update_calculation,
    update_profile,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(RequestLogger)

            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/add", web::get().to(add))
            .route("/subtract", web::get().to(subtract))
            .route("/multiply", web::get().to(multiply))
            .route("/divide", web::get().to(divide))
            .route("/users/register", web::post().to(register))
            .route("/users/login", web::post().to(login))
            .route("/users/refresh", web::post().to(refresh))

            // Protected user routes (require JWT authentication; admin-only
            // handlers gate on the principal's role)
            .service(
                web::scope("/users")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(list_users))
                    .route("/logout", web::post().to(logout))
                    .route("/me", web::get().to(get_current_user))
                    .route("/me", web::patch().to(update_profile))
                    .route("/me/change-password", web::post().to(change_password))
                    .route("/me/tokens", web::get().to(list_my_tokens))
                    .route("/me/tokens/{token_id}", web::delete().to(revoke_my_token))
                    .route("/me/revoke", web::post().to(revoke_my_token_by_string))
                    .route("/{username}/role", web::post().to(set_user_role))
                    .route("/{username}/revoke_all", web::post().to(revoke_all_tokens_for_user)),
            )

            // Admin surface
            .service(
                web::scope("/admin")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/users", web::get().to(list_users_with_token_counts))
                    .route("/users/{username}/tokens", web::get().to(list_tokens_for_user))
                    .route("/tokens", web::get().to(list_all_tokens))
                    .route("/tokens/revoke", web::post().to(revoke_token_by_string)),
            )

            // Calculation resource (BREAD)
            .service(
                web::scope("/calculations")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(list_calculations))
                    .route("", web::post().to(create_calculation))
                    .route("/{calc_id}", web::get().to(read_calculation))
                    .route("/{calc_id}", web::put().to(update_calculation))
                    .route("/{calc_id}", web::patch().to(patch_calculation))
                    .route("/{calc_id}", web::delete().to(delete_calculation)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
