//! Integration tests for invitations, role-based access, comment threads and
//! admin token grants.

mod common;

use axum::http::StatusCode;
use axum::Router;
use serde_json::json;
use sqlx::PgPool;

use common::*;

/// Invite `login` to the project as `role` and return the invitation token.
async fn invite(app: Router, owner: &TestUser, project_id: i64, login: &str, role: &str) -> String {
    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/collaborators"),
        &owner.token,
        json!({ "login": login, "role": role }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["collaborator"]["status"], "pending");
    json["invitation_token"].as_str().unwrap().to_string()
}

async fn accept(app: Router, user: &TestUser, token: &str) {
    let response = post_json_auth(
        app,
        &format!("/api/v1/collaboration/invitations/{token}/accept"),
        &user.token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// An owner on the pro plan with a project, plus a second registered user.
async fn setup(pool: &PgPool, app: &Router) -> (TestUser, TestUser, i64) {
    let owner = register(app.clone(), "anna").await;
    set_plan(pool, owner.id, "pro").await;
    let guest = register(app.clone(), "boris").await;
    let project_id = create_project(app.clone(), &owner, "The Letter").await;
    (owner, guest, project_id)
}

async fn comment(
    app: Router,
    user: &TestUser,
    project_id: i64,
    body: serde_json::Value,
) -> axum::http::Response<axum::body::Body> {
    post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/comments"),
        &user.token,
        body,
    )
    .await
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn free_plan_has_no_seats(pool: PgPool) {
    let app = build_test_app(pool);
    let owner = register(app.clone(), "anna").await;
    register(app.clone(), "boris").await;
    let project_id = create_project(app.clone(), &owner, "The Letter").await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/collaborators"),
        &owner.token,
        json!({ "login": "boris", "role": "viewer" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn accepted_invitation_grants_access(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;

    // Not a member yet.
    let before = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &guest.token,
    )
    .await;
    assert_eq!(before.status(), StatusCode::NOT_FOUND);

    let token = invite(app.clone(), &owner, project_id, "boris@example.com", "viewer").await;

    // Pending invitations grant nothing.
    let pending = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &guest.token,
    )
    .await;
    assert_eq!(pending.status(), StatusCode::NOT_FOUND);

    accept(app.clone(), &guest, &token).await;

    let after = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &guest.token,
    )
    .await;
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(body_json(after).await["access_role"], "viewer");

    let list = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/collaborators"),
        &guest.token,
    )
    .await;
    let list = body_json(list).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["status"], "active");

    // The token is single-use.
    let again = post_json_auth(
        app,
        &format!("/api/v1/collaboration/invitations/{token}/accept"),
        &guest.token,
        json!({}),
    )
    .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invitation_is_bound_to_the_invitee(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, _guest, project_id) = setup(&pool, &app).await;
    let intruder = register(app.clone(), "clara").await;
    let token = invite(app.clone(), &owner, project_id, "boris", "editor").await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/collaboration/invitations/{token}/accept"),
        &intruder.token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn declined_invitation_can_be_renewed(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let token = invite(app.clone(), &owner, project_id, "boris", "viewer").await;

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/collaboration/invitations/{token}/decline"),
        &guest.token,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "declined");

    let renewed = invite(app, &owner, project_id, "boris", "commenter").await;
    assert_ne!(renewed, token);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invitation_conflicts_and_bad_targets(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, _guest, project_id) = setup(&pool, &app).await;
    let uri = format!("/api/v1/projects/{project_id}/collaborators");

    invite(app.clone(), &owner, project_id, "boris", "viewer").await;
    let duplicate = post_json_auth(
        app.clone(),
        &uri,
        &owner.token,
        json!({ "login": "boris", "role": "editor" }),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let self_invite = post_json_auth(
        app.clone(),
        &uri,
        &owner.token,
        json!({ "login": "anna", "role": "viewer" }),
    )
    .await;
    assert_eq!(self_invite.status(), StatusCode::BAD_REQUEST);

    let nobody = post_json_auth(
        app.clone(),
        &uri,
        &owner.token,
        json!({ "login": "nobody", "role": "viewer" }),
    )
    .await;
    assert_eq!(nobody.status(), StatusCode::BAD_REQUEST);

    let owner_role = post_json_auth(
        app,
        &uri,
        &owner.token,
        json!({ "login": "boris", "role": "owner" }),
    )
    .await;
    assert_eq!(owner_role.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(owner_role).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn viewer_cannot_edit_or_comment(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let scene_id = create_scene(app.clone(), &owner, project_id, "Opening").await;
    let token = invite(app.clone(), &owner, project_id, "boris", "viewer").await;
    accept(app.clone(), &guest, &token).await;

    let edit = put_json_auth(
        app.clone(),
        &format!("/api/v1/scenes/{scene_id}"),
        &guest.token,
        json!({ "title": "Hijacked" }),
    )
    .await;
    assert_eq!(edit.status(), StatusCode::FORBIDDEN);

    let response = comment(app.clone(), &guest, project_id, json!({ "content": "Nice" })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Only the owner manages the team.
    let response = put_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/collaborators/{}", guest.id),
        &guest.token,
        json!({ "role": "editor" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn promotion_to_editor_allows_edits(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let scene_id = create_scene(app.clone(), &owner, project_id, "Opening").await;
    let token = invite(app.clone(), &owner, project_id, "boris", "commenter").await;
    accept(app.clone(), &guest, &token).await;

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/collaborators/{}", guest.id),
        &owner.token,
        json!({ "role": "editor" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["role"], "editor");

    let edit = put_json_auth(
        app,
        &format!("/api/v1/scenes/{scene_id}"),
        &guest.token,
        json!({ "title": "Opening, revised" }),
    )
    .await;
    assert_eq!(edit.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn removed_collaborator_loses_access(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let token = invite(app.clone(), &owner, project_id, "boris", "editor").await;
    accept(app.clone(), &guest, &token).await;

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/collaborators/{}", guest.id),
        &owner.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(app, &format!("/api/v1/projects/{project_id}"), &guest.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn collaborator_can_leave(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let token = invite(app.clone(), &owner, project_id, "boris", "viewer").await;
    accept(app.clone(), &guest, &token).await;

    let response = delete_auth(
        app,
        &format!("/api/v1/projects/{project_id}/collaborators/{}", guest.id),
        &guest.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn comment_threads_are_depth_limited(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, _guest, project_id) = setup(&pool, &app).await;

    let mut parent: Option<i64> = None;
    for depth in 0..=5 {
        let response = comment(
            app.clone(),
            &owner,
            project_id,
            json!({ "content": format!("Level {depth}"), "parent_comment_id": parent }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED, "depth {depth}");
        let json = body_json(response).await;
        assert_eq!(json["data"]["thread_depth"], depth);
        assert_eq!(json["data"]["comment_type"], "general");
        parent = json["data"]["id"].as_i64();
    }

    let too_deep = comment(
        app.clone(),
        &owner,
        project_id,
        json!({ "content": "Level 6", "parent_comment_id": parent }),
    )
    .await;
    assert_eq!(too_deep.status(), StatusCode::BAD_REQUEST);

    let list = get_auth(
        app,
        &format!("/api/v1/projects/{project_id}/comments"),
        &owner.token,
    )
    .await;
    assert_eq!(body_json(list).await["data"].as_array().unwrap().len(), 6);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn comment_validation(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, _guest, project_id) = setup(&pool, &app).await;
    let other_project = create_project(app.clone(), &owner, "Another").await;
    let foreign_scene = create_scene(app.clone(), &owner, other_project, "Elsewhere").await;

    let blank = comment(app.clone(), &owner, project_id, json!({ "content": "   " })).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let long = comment(
        app.clone(),
        &owner,
        project_id,
        json!({ "content": "x".repeat(5001) }),
    )
    .await;
    assert_eq!(long.status(), StatusCode::BAD_REQUEST);

    let bad_type = comment(
        app.clone(),
        &owner,
        project_id,
        json!({ "content": "Hmm", "comment_type": "rant" }),
    )
    .await;
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

    let wrong_scene = comment(
        app,
        &owner,
        project_id,
        json!({ "content": "Hmm", "scene_id": foreign_scene }),
    )
    .await;
    assert_eq!(wrong_scene.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn comment_resolution_and_deletion(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (owner, guest, project_id) = setup(&pool, &app).await;
    let scene_id = create_scene(app.clone(), &owner, project_id, "Opening").await;
    let token = invite(app.clone(), &owner, project_id, "boris", "commenter").await;
    accept(app.clone(), &guest, &token).await;

    let response = comment(
        app.clone(),
        &owner,
        project_id,
        json!({ "content": "Tighten this", "scene_id": scene_id, "comment_type": "suggestion" }),
    )
    .await;
    let owners_comment = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = comment(app.clone(), &guest, project_id, json!({ "content": "Agreed" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let guests_comment = body_json(response).await["data"]["id"].as_i64().unwrap();

    let filtered = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/comments?scene_id={scene_id}"),
        &guest.token,
    )
    .await;
    assert_eq!(body_json(filtered).await["data"].as_array().unwrap().len(), 1);

    let resolved = post_json_auth(
        app.clone(),
        &format!("/api/v1/comments/{owners_comment}/resolve"),
        &guest.token,
        json!({}),
    )
    .await;
    assert_eq!(resolved.status(), StatusCode::OK);
    let resolved = body_json(resolved).await;
    assert_eq!(resolved["data"]["is_resolved"], true);
    assert_eq!(resolved["data"]["resolved_by"], guest.id);

    // A commenter cannot delete someone else's comment.
    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/comments/{owners_comment}"),
        &guest.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner can.
    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/comments/{guests_comment}"),
        &owner.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let analytics = get_auth(
        app,
        &format!("/api/v1/projects/{project_id}/collaboration/analytics"),
        &owner.token,
    )
    .await;
    let analytics = body_json(analytics).await;
    assert_eq!(analytics["data"]["total_collaborators"], 1);
    assert_eq!(analytics["data"]["active_collaborators"], 1);
    assert_eq!(analytics["data"]["total_comments"], 1);
    assert_eq!(analytics["data"]["resolved_comments"], 1);
    assert_eq!(analytics["data"]["online_now"], 0);
    // (1.0 * 0.7 + 0.1 * 0.3) * 5
    assert_eq!(analytics["data"]["collaboration_score"], 3.65);
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_grants_tokens(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let admin = register(app.clone(), "admin").await;
    let writer = register(app.clone(), "anna").await;
    set_balance(&pool, writer.id, 900, 1000).await;
    let uri = format!("/api/v1/admin/users/{}/tokens", writer.id);

    let denied = post_json_auth(app.clone(), &uri, &writer.token, json!({ "amount": 100 })).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(admin.id)
        .execute(&pool)
        .await
        .unwrap();
    // The role travels in the access token, so log in again.
    let login = post_json(
        app.clone(),
        "/api/v1/auth/login",
        json!({ "login": "admin", "password": TEST_PASSWORD }),
    )
    .await;
    let admin_token = body_json(login).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let bonus = post_json_auth(app.clone(), &uri, &admin_token, json!({ "amount": 300 })).await;
    assert_eq!(bonus.status(), StatusCode::OK);
    let bonus = body_json(bonus).await;
    assert_eq!(bonus["data"]["tokens_used"], 600);
    assert_eq!(bonus["data"]["tokens_limit"], 1000);

    let purchase = post_json_auth(
        app.clone(),
        &uri,
        &admin_token,
        json!({ "amount": 500, "kind": "purchase", "reason": "support ticket" }),
    )
    .await;
    assert_eq!(body_json(purchase).await["data"]["tokens_limit"], 1500);

    let zero = post_json_auth(app.clone(), &uri, &admin_token, json!({ "amount": 0 })).await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let missing = post_json_auth(
        app,
        "/api/v1/admin/users/999999/tokens",
        &admin_token,
        json!({ "amount": 10 }),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
