//! Integration tests for the calculation resource (BREAD)

use calc_api::configuration::{get_configuration, DatabaseSettings};
use calc_api::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let jwt_config = configuration.jwt.clone();
    let server = run(listener, connection_pool.clone(), jwt_config).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

/// Register and log in a user, returning a bearer access token.
async fn access_token_for(app: &TestApp, username: &str, email: &str) -> String {
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/users/register", &app.address))
        .json(&json!({
            "username": username,
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let response = client
        .post(&format!("{}/users/login", &app.address))
        .json(&json!({ "identifier": username, "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_calculation(app: &TestApp, token: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(&format!("{}/calculations", &app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request.")
}

#[tokio::test]
async fn create_and_read_calculation() {
    let app = spawn_app().await;
    let token = access_token_for(&app, "alice", "alice@example.com").await;

    let response =
        create_calculation(&app, &token, json!({"operation": "add", "operands": [10, 20, 5]})).await;
    assert_eq!(201, response.status().as_u16());

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["operation"], "add");
    assert_eq!(created["operands"], json!([10.0, 20.0, 5.0]));
    assert_eq!(created["result"], 35.0);
    let calc_id = created["id"].as_str().unwrap();

    let response = reqwest::Client::new()
        .get(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["result"], 35.0);
}

#[tokio::test]
async fn legacy_two_operand_body_is_accepted() {
    let app = spawn_app().await;
    let token = access_token_for(&app, "bob", "bob@example.com").await;

    let response =
        create_calculation(&app, &token, json!({"a": 100, "b": 4, "type": "Divide"})).await;
    assert_eq!(201, response.status().as_u16());

    let created: Value = response.json().await.unwrap();
    assert_eq!(created["operation"], "div");
    assert_eq!(created["operands"], json!([100.0, 4.0]));
    assert_eq!(created["result"], 25.0);
}

#[tokio::test]
async fn division_by_zero_is_rejected_before_persistence() {
    let app = spawn_app().await;
    let token = access_token_for(&app, "carol", "carol@example.com").await;

    let response =
        create_calculation(&app, &token, json!({"operation": "div", "operands": [10, 0]})).await;
    assert_eq!(400, response.status().as_u16());

    // No row created
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calculations")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to count calculations");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn too_few_operands_rejected() {
    let app = spawn_app().await;
    let token = access_token_for(&app, "dave", "dave@example.com").await;

    let response =
        create_calculation(&app, &token, json!({"operation": "add", "operands": [1]})).await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn browse_lists_only_own_calculations() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = access_token_for(&app, "alice", "alice@example.com").await;
    let bob = access_token_for(&app, "bob", "bob@example.com").await;

    for i in 0..3 {
        let response = create_calculation(
            &app,
            &alice,
            json!({"operation": "mul", "operands": [i + 1, 2]}),
        )
        .await;
        assert_eq!(201, response.status().as_u16());
    }
    let response =
        create_calculation(&app, &bob, json!({"operation": "add", "operands": [1, 1]})).await;
    assert_eq!(201, response.status().as_u16());

    let listed: Vec<Value> = client
        .get(&format!("{}/calculations", &app.address))
        .header("Authorization", format!("Bearer {}", alice))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);

    let listed: Vec<Value> = client
        .get(&format!("{}/calculations", &app.address))
        .header("Authorization", format!("Bearer {}", bob))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn put_replaces_and_recomputes() {
    let app = spawn_app().await;
    let token = access_token_for(&app, "erin", "erin@example.com").await;

    let created: Value =
        create_calculation(&app, &token, json!({"operation": "sub", "operands": [100, 25]}))
            .await
            .json()
            .await
            .unwrap();
    assert_eq!(created["result"], 75.0);
    let calc_id = created["id"].as_str().unwrap();

    let response = reqwest::Client::new()
        .put(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"operation": "add", "operands": [1, 2, 3]}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["operation"], "add");
    assert_eq!(updated["result"], 6.0);
}

#[tokio::test]
async fn patch_updates_operands_and_recomputes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = access_token_for(&app, "frank", "frank@example.com").await;

    let created: Value =
        create_calculation(&app, &token, json!({"operation": "div", "operands": [20, 4]}))
            .await
            .json()
            .await
            .unwrap();
    assert_eq!(created["result"], 5.0);
    let calc_id = created["id"].as_str().unwrap();

    // Replace the operand list
    let response = client
        .patch(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"operands": [20, 5]}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let patched: Value = response.json().await.unwrap();
    assert_eq!(patched["result"], 4.0);

    // Legacy form patches the second operand only
    let response = client
        .patch(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"b": 2}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let patched: Value = response.json().await.unwrap();
    assert_eq!(patched["operands"], json!([20.0, 2.0]));
    assert_eq!(patched["result"], 10.0);

    // Patching to a zero divisor is rejected
    let response = client
        .patch(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"b": 0}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn delete_removes_the_calculation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = access_token_for(&app, "grace", "grace@example.com").await;

    let created: Value =
        create_calculation(&app, &token, json!({"operation": "add", "operands": [1, 2]}))
            .await
            .json()
            .await
            .unwrap();
    let calc_id = created["id"].as_str().unwrap();

    let response = client
        .delete(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let response = client
        .get(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn cross_user_access_looks_like_not_found() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = access_token_for(&app, "heidi", "heidi@example.com").await;
    let intruder = access_token_for(&app, "ivan", "ivan@example.com").await;

    let created: Value =
        create_calculation(&app, &owner, json!({"operation": "add", "operands": [2, 2]}))
            .await
            .json()
            .await
            .unwrap();
    let calc_id = created["id"].as_str().unwrap();

    // Reads, writes, and deletes by a non-owner are all indistinguishable
    // from a missing resource
    let response = client
        .get(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", intruder))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    let response = client
        .put(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", intruder))
        .json(&json!({"operation": "add", "operands": [9, 9]}))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    let response = client
        .delete(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", intruder))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    // The owner still sees it, untouched
    let response = client
        .get(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", owner))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], 4.0);
}

#[tokio::test]
async fn admin_can_read_any_calculation() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = access_token_for(&app, "judy", "judy@example.com").await;
    access_token_for(&app, "root", "root@example.com").await;

    // Promote and re-login so the new token carries the admin role
    sqlx::query("UPDATE users SET role = 'admin' WHERE username = 'root'")
        .execute(&app.db_pool)
        .await
        .expect("Failed to promote user");
    let admin_login: Value = client
        .post(&format!("{}/users/login", &app.address))
        .json(&json!({ "identifier": "root", "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin = admin_login["access_token"].as_str().unwrap();

    let created: Value =
        create_calculation(&app, &owner, json!({"operation": "mul", "operands": [3, 3]}))
            .await
            .json()
            .await
            .unwrap();
    let calc_id = created["id"].as_str().unwrap();

    let response = client
        .get(&format!("{}/calculations/{}", &app.address, calc_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn calculations_require_authentication() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/calculations", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}
