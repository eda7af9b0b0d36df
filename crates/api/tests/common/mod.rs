#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use storyforge_api::auth::jwt::JwtConfig;
use storyforge_api::config::ServerConfig;
use storyforge_api::router::build_app_router;
use storyforge_api::state::AppState;
use storyforge_api::ws::{PresenceTracker, WsManager};
use storyforge_events::EventBus;
use storyforge_llm::{LlmClient, LlmConfig};
use storyforge_payments::{PaymentConfig, SimulatedGateway};

pub const TEST_PASSWORD: &str = "grandmother-anna";

/// A `ServerConfig` with safe defaults: simulated completions and payments,
/// a fixed JWT secret and the dev CORS origin.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        min_password_length: 8,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        llm: LlmConfig::default(),
        payments: PaymentConfig::default(),
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
        presence: Arc::new(PresenceTracker::new()),
        event_bus: Arc::new(EventBus::default()),
        llm: Arc::new(LlmClient::simulated()),
        payments: Arc::new(SimulatedGateway),
    }
}

/// Build the full application router, with the production middleware stack,
/// on top of `pool`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("body should be UTF-8")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A registered user and their access token.
pub struct TestUser {
    pub id: i64,
    pub token: String,
}

/// Register `username` through the API.
pub async fn register(app: Router, username: &str) -> TestUser {
    let body = serde_json::json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": TEST_PASSWORD,
    });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    TestUser {
        id: json["user"]["id"].as_i64().expect("user id"),
        token: json["access_token"]
            .as_str()
            .expect("access token")
            .to_string(),
    }
}

/// Create a project owned by `user` and return its id.
pub async fn create_project(app: Router, user: &TestUser, title: &str) -> i64 {
    let response = post_json_auth(
        app,
        "/api/v1/projects",
        &user.token,
        serde_json::json!({ "title": title, "genre": "drama" }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["id"].as_i64().expect("project id")
}

/// Create a scene without a description (uncharged) and return its id.
pub async fn create_scene(app: Router, user: &TestUser, project_id: i64, title: &str) -> i64 {
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/scenes"),
        &user.token,
        serde_json::json!({ "title": title, "scene_type": "development" }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["scene"]["id"]
        .as_i64()
        .expect("scene id")
}

pub async fn set_plan(pool: &PgPool, user_id: i64, plan: &str) {
    sqlx::query("UPDATE users SET plan = $2 WHERE id = $1")
        .bind(user_id)
        .bind(plan)
        .execute(pool)
        .await
        .expect("plan update should succeed");
}

pub async fn set_balance(pool: &PgPool, user_id: i64, used: i64, limit: i64) {
    sqlx::query("UPDATE users SET tokens_used = $2, tokens_limit = $3 WHERE id = $1")
        .bind(user_id)
        .bind(used)
        .bind(limit)
        .execute(pool)
        .await
        .expect("balance update should succeed");
}
