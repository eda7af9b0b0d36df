//! HTTP-level integration tests for registration, login, refresh and logout.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json, post_json_auth, register, TEST_PASSWORD};
use serde_json::json;
use sqlx::PgPool;

async fn login(app: axum::Router, login: &str, password: &str) -> axum::response::Response {
    post_json(
        app,
        "/api/v1/auth/login",
        json!({ "login": login, "password": password }),
    )
    .await
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_starts_on_free_plan(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "username": "anna", "email": "Anna@Example.com", "password": TEST_PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["expires_in"], 900);
    assert_eq!(json["user"]["email"], "anna@example.com");
    assert_eq!(json["user"]["plan"], "free");
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["user"]["tokens_remaining"], 1000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_username_is_a_conflict(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;

    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "username": "anna", "email": "other@example.com", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn short_password_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "username": "anna", "email": "anna@example.com", "password": "short" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn login_accepts_username_or_email(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;

    let by_name = login(app.clone(), "anna", TEST_PASSWORD).await;
    assert_eq!(by_name.status(), StatusCode::OK);

    let by_email = login(app, "anna@example.com", TEST_PASSWORD).await;
    assert_eq!(by_email.status(), StatusCode::OK);
    let json = body_json(by_email).await;
    assert!(json["user"]["last_login_at"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn wrong_password_and_unknown_user_are_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;

    assert_eq!(
        login(app.clone(), "anna", "not-the-password").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(app, "ghost", TEST_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn five_failures_lock_the_account(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;

    for _ in 0..5 {
        let response = login(app.clone(), "anna", "wrong-password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused while locked.
    let response = login(app, "anna", TEST_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn refresh_rotates_the_token(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;
    let json = body_json(login(app.clone(), "anna", TEST_PASSWORD).await).await;
    let refresh_token = json["refresh_token"].as_str().unwrap().to_string();

    let response = post_json(
        app.clone(),
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert_ne!(rotated["refresh_token"], json["refresh_token"]);

    // The old token was revoked by the rotation.
    let replay = post_json(
        app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn logout_revokes_refresh_tokens(pool: PgPool) {
    let app = common::build_test_app(pool);
    register(app.clone(), "anna").await;
    let json = body_json(login(app.clone(), "anna", TEST_PASSWORD).await).await;
    let access = json["access_token"].as_str().unwrap();

    let response = post_json_auth(app.clone(), "/api/v1/auth/logout", access, json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        app,
        "/api/v1/auth/refresh",
        json!({ "refresh_token": json["refresh_token"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn me_returns_the_current_user(pool: PgPool) {
    let app = common::build_test_app(pool);
    let user = register(app.clone(), "anna").await;

    let response = get_auth(app.clone(), "/api/v1/auth/me", &user.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], user.id);

    let response = get_auth(app, "/api/v1/auth/me", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
