//! Integration tests for projects, scenes, objects and access control.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_project, create_scene, delete_auth, get_auth, post_json_auth, put_json_auth,
    register,
};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_list_and_get_project(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "The Letter").await;
    create_scene(app.clone(), &anna, project_id, "Attic").await;

    let response = get_auth(app.clone(), "/api/v1/projects", &anna.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["title"], "The Letter");
    assert_eq!(list["data"][0]["scene_count"], 1);
    assert_eq!(list["data"][0]["access_role"], "owner");

    let response = get_auth(app, &format!("/api/v1/projects/{project_id}"), &anna.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["access_role"], "owner");
    assert_eq!(detail["scenes"][0]["title"], "Attic");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn free_plan_allows_three_projects(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    for i in 0..3 {
        create_project(app.clone(), &anna, &format!("Draft {i}")).await;
    }

    let response = post_json_auth(
        app,
        "/api/v1/projects",
        &anna.token,
        json!({ "title": "One too many" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_phase_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;

    let response = post_json_auth(
        app,
        "/api/v1/projects",
        &anna.token,
        json!({ "title": "T", "current_phase": "publishing" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn strangers_cannot_see_projects(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let bob = register(app.clone(), "bob").await;
    let project_id = create_project(app.clone(), &anna, "Private").await;
    let scene_id = create_scene(app.clone(), &anna, project_id, "Attic").await;

    let response = get_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &bob.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_auth(app.clone(), &format!("/api/v1/scenes/{scene_id}"), &bob.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_auth(app, "/api/v1/projects", &bob.token).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_and_delete_project(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "Draft").await;

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &anna.token,
        json!({ "title": "Final", "current_phase": "expand" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Final");
    assert_eq!(json["current_phase"], "expand");

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}"),
        &anna.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(app, &format!("/api/v1/projects/{project_id}"), &anna.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn scenes_can_be_reordered(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "Draft").await;
    let first = create_scene(app.clone(), &anna, project_id, "First").await;
    let second = create_scene(app.clone(), &anna, project_id, "Second").await;

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/scenes/reorder"),
        &anna.token,
        json!({ "scene_ids": [second, first] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["id"], second);
    assert_eq!(json["data"][1]["id"], first);

    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/scenes/reorder"),
        &anna.token,
        json!({ "scene_ids": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn scene_without_description_is_free(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "Draft").await;

    let response = post_json_auth(
        app,
        &format!("/api/v1/projects/{project_id}/scenes"),
        &anna.token,
        json!({ "title": "Quiet", "emotional_intensity": 3.5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["tokens_used"], 0);
    assert!(json["objects"].as_array().unwrap().is_empty());
    assert_eq!(json["scene"]["emotional_intensity"], 1.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn objects_are_unique_per_kind_and_linkable(pool: PgPool) {
    let app = common::build_test_app(pool);
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "Draft").await;
    let scene_id = create_scene(app.clone(), &anna, project_id, "Attic").await;
    let objects_uri = format!("/api/v1/projects/{project_id}/objects");

    let response = post_json_auth(
        app.clone(),
        &objects_uri,
        &anna.token,
        json!({ "name": "Anna", "object_type": "character" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let object_id = body_json(response).await["id"].as_i64().unwrap();

    let response = post_json_auth(
        app.clone(),
        &objects_uri,
        &anna.token,
        json!({ "name": "anna", "object_type": "character" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/scenes/{scene_id}/objects"),
        &anna.token,
        json!({ "object_id": object_id, "significance": "main" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/scenes/{scene_id}/objects/{object_id}"),
        &anna.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json_auth(
        app,
        &objects_uri,
        &anna.token,
        json!({ "name": "Ghost", "object_type": "spaceship" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn project_changes_are_recorded_as_activity(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let anna = register(app.clone(), "anna").await;
    let project_id = create_project(app.clone(), &anna, "Draft").await;

    // Persist what the bus would deliver, without running the background task.
    let event = storyforge_events::StoryEvent::new(storyforge_events::kinds::PROJECT_UPDATED)
        .in_project(project_id)
        .with_actor(anna.id);
    storyforge_events::EventPersistence::persist(&pool, &event)
        .await
        .expect("event should persist");

    let response = get_auth(
        app,
        &format!("/api/v1/projects/{project_id}/activity"),
        &anna.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["kind"], "project.updated");
}
