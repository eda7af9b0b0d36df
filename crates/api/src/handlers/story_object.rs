//! Handlers for story objects (`/projects/{id}/objects`, `/objects/{id}`).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use storyforge_core::collaboration::Permission;
use storyforge_core::error::CoreError;
use storyforge_core::story::{
    normalize_object_name, validate_one_of, ObjectKind, VALID_IMPORTANCE, VALID_OBJECT_STATUSES,
};
use storyforge_core::types::DbId;
use storyforge_db::models::story_object::{
    CreateStoryObject, StoryObject, StoryObjectWithUsage, UpdateStoryObject,
};
use storyforge_db::repositories::StoryObjectRepo;
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ObjectFilter {
    pub object_type: Option<String>,
}

/// GET /api/v1/projects/{id}/objects?object_type=
pub async fn list_objects(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Query(filter): Query<ObjectFilter>,
) -> AppResult<Json<DataResponse<Vec<StoryObjectWithUsage>>>> {
    if let Some(kind) = &filter.object_type {
        parse_kind(kind)?;
    }
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let objects =
        StoryObjectRepo::list_for_project(&state.pool, project_id, filter.object_type.as_deref())
            .await?;
    Ok(Json(DataResponse { data: objects }))
}

/// POST /api/v1/projects/{id}/objects
///
/// Names are unique per project and kind, case-insensitively (409).
pub async fn create_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(mut input): Json<CreateStoryObject>,
) -> AppResult<(StatusCode, Json<StoryObject>)> {
    input.validate().map_err(CoreError::from)?;
    input.name = normalize_object_name(&input.name)
        .ok_or_else(|| CoreError::Validation("name must not be blank".into()))?;
    parse_kind(&input.object_type)?;
    validate_labels(input.importance.as_deref(), input.status.as_deref())?;
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;

    let object = StoryObjectRepo::create(&state.pool, project_id, &input).await?;
    publish_object_event(&state, kinds::OBJECT_CREATED, &object, auth.user_id);
    Ok((StatusCode::CREATED, Json(object)))
}

/// GET /api/v1/objects/{id}
pub async fn get_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<StoryObject>> {
    let object = load_object(&state.pool, id, &auth, Permission::View).await?;
    Ok(Json(object))
}

/// PUT /api/v1/objects/{id}
pub async fn update_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateStoryObject>,
) -> AppResult<Json<StoryObject>> {
    input.validate().map_err(CoreError::from)?;
    if let Some(name) = &input.name {
        input.name = Some(
            normalize_object_name(name)
                .ok_or_else(|| CoreError::Validation("name must not be blank".into()))?,
        );
    }
    validate_labels(input.importance.as_deref(), input.status.as_deref())?;
    load_object(&state.pool, id, &auth, Permission::Edit).await?;

    let object = StoryObjectRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "StoryObject",
            id,
        })?;
    publish_object_event(&state, kinds::OBJECT_UPDATED, &object, auth.user_id);
    Ok(Json(object))
}

/// DELETE /api/v1/objects/{id}
///
/// Also removes the object's scene links.
pub async fn delete_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let object = load_object(&state.pool, id, &auth, Permission::Edit).await?;
    StoryObjectRepo::delete(&state.pool, id).await?;
    publish_object_event(&state, kinds::OBJECT_DELETED, &object, auth.user_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_object(
    pool: &DbPool,
    id: DbId,
    auth: &AuthUser,
    permission: Permission,
) -> AppResult<StoryObject> {
    let not_found = || CoreError::NotFound {
        entity: "StoryObject",
        id,
    };
    let object = StoryObjectRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(not_found)?;
    require_project(pool, object.project_id, auth, permission)
        .await
        .map_err(|e| match e {
            AppError::Core(CoreError::NotFound { .. }) => not_found().into(),
            other => other,
        })?;
    Ok(object)
}

fn parse_kind(value: &str) -> AppResult<ObjectKind> {
    ObjectKind::parse(value).ok_or_else(|| {
        CoreError::Validation(format!(
            "Invalid object_type '{value}'. Must be one of: character, location, prop, conflict"
        ))
        .into()
    })
}

fn validate_labels(importance: Option<&str>, status: Option<&str>) -> AppResult<()> {
    if let Some(importance) = importance {
        validate_one_of("importance", importance, VALID_IMPORTANCE)
            .map_err(CoreError::Validation)?;
    }
    if let Some(status) = status {
        validate_one_of("status", status, VALID_OBJECT_STATUSES).map_err(CoreError::Validation)?;
    }
    Ok(())
}

fn publish_object_event(state: &AppState, kind: &str, object: &StoryObject, actor: DbId) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(object.project_id)
            .with_source("story_object", object.id)
            .with_actor(actor)
            .with_payload(json!({ "name": object.name, "object_type": object.object_type })),
    );
}
