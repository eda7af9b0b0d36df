//! Handlers for scenes (`/projects/{id}/scenes`, `/scenes/{id}`) and their
//! object links.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storyforge_core::collaboration::Permission;
use storyforge_core::error::CoreError;
use storyforge_core::story::{
    clamp_intensity, validate_one_of, VALID_SCENE_TYPES, VALID_SIGNIFICANCE,
};
use storyforge_core::tokens::OperationType;
use storyforge_core::types::DbId;
use storyforge_db::models::scene::{
    CreateScene, LinkSceneObject, Scene, SceneObjectLink, UpdateScene,
};
use storyforge_db::models::story_object::StoryObject;
use storyforge_db::repositories::{ProjectRepo, SceneObjectRepo, SceneRepo, StoryObjectRepo};
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};
use validator::Validate;

use crate::ai::extraction::{apply_extracted_objects, extract_scene_objects};
use crate::ai::Meter;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::{require_project, ProjectMember};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReorderScenes {
    pub scene_ids: Vec<DbId>,
}

/// A newly created scene and the objects recognized in its description.
#[derive(Debug, Serialize)]
pub struct CreatedScene {
    pub scene: Scene,
    pub objects: Vec<StoryObject>,
    /// Tokens charged for object extraction (0 without a description).
    pub tokens_used: i64,
    pub remaining_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SceneDetail {
    #[serde(flatten)]
    pub scene: Scene,
    pub objects: Vec<SceneObjectLink>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/scenes
pub async fn list_scenes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Scene>>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let scenes = SceneRepo::list_for_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: scenes }))
}

/// POST /api/v1/projects/{id}/scenes
///
/// A scene with a description is charged as `create_scene`: the model
/// extracts the objects it mentions, which are created (or reactivated) and
/// linked. The scene, its objects and the charge commit together; a balance
/// drained by a concurrent charge returns 402 and leaves nothing behind.
pub async fn create_scene(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(mut input): Json<CreateScene>,
) -> AppResult<(StatusCode, Json<CreatedScene>)> {
    validate_scene_fields(&input, input.scene_type.as_deref())?;
    input.emotional_intensity = input.emotional_intensity.map(clamp_intensity);
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;

    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let created = match description {
        None => CreatedScene {
            scene: SceneRepo::create(&state.pool, project_id, &input).await?,
            objects: Vec::new(),
            tokens_used: 0,
            remaining_tokens: None,
        },
        Some(text) => {
            let meter = Meter::quote(&state, auth.user_id, OperationType::CreateScene, &text)
                .await?
                .in_project(project_id);
            let project = ProjectRepo::find_by_id(&state.pool, project_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "Project",
                    id: project_id,
                })?;
            let (extracted, usage) = extract_scene_objects(&state.llm, &project, &text).await;

            let mut tx = meter.begin(&state).await?;
            let scene = SceneRepo::create(&mut *tx, project_id, &input).await?;
            let origin = format!("scene: {}", scene.title);
            let objects =
                apply_extracted_objects(&mut tx, project_id, Some(scene.id), &extracted, &origin)
                    .await?;
            let settled = meter.for_scene(scene.id).settle_in_tx(&state, tx, &usage).await?;

            CreatedScene {
                scene,
                objects,
                tokens_used: settled.tokens_used,
                remaining_tokens: Some(settled.remaining_tokens),
            }
        }
    };

    tracing::info!(
        user_id = auth.user_id,
        project_id,
        scene_id = created.scene.id,
        objects = created.objects.len(),
        "Scene created"
    );
    publish_scene_event(&state, kinds::SCENE_CREATED, &created.scene, auth.user_id);

    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/v1/projects/{id}/scenes/reorder
///
/// Body lists every scene id to renumber, in the new order.
pub async fn reorder_scenes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<ReorderScenes>,
) -> AppResult<Json<DataResponse<Vec<Scene>>>> {
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;

    if input.scene_ids.is_empty() {
        return Err(AppError::BadRequest("scene_ids must not be empty".into()));
    }
    if !SceneRepo::reorder(&state.pool, project_id, &input.scene_ids).await? {
        return Err(AppError::BadRequest(
            "scene_ids must all belong to this project".into(),
        ));
    }

    state.event_bus.publish(
        StoryEvent::new(kinds::SCENES_REORDERED)
            .in_project(project_id)
            .with_actor(auth.user_id)
            .with_payload(json!({ "scene_ids": input.scene_ids })),
    );

    let scenes = SceneRepo::list_for_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: scenes }))
}

/// GET /api/v1/scenes/{id}
pub async fn get_scene(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<SceneDetail>> {
    let (scene, _) = load_scene(&state.pool, id, &auth, Permission::View).await?;
    let objects = SceneObjectRepo::list_for_scene(&state.pool, id).await?;
    Ok(Json(SceneDetail { scene, objects }))
}

/// PUT /api/v1/scenes/{id}
pub async fn update_scene(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateScene>,
) -> AppResult<Json<Scene>> {
    validate_scene_fields(&input, input.scene_type.as_deref())?;
    input.emotional_intensity = input.emotional_intensity.map(clamp_intensity);
    load_scene(&state.pool, id, &auth, Permission::Edit).await?;

    let scene = SceneRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound { entity: "Scene", id })?;
    publish_scene_event(&state, kinds::SCENE_UPDATED, &scene, auth.user_id);
    Ok(Json(scene))
}

/// DELETE /api/v1/scenes/{id}
pub async fn delete_scene(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let (scene, _) = load_scene(&state.pool, id, &auth, Permission::Edit).await?;
    SceneRepo::delete(&state.pool, id).await?;
    publish_scene_event(&state, kinds::SCENE_DELETED, &scene, auth.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/scenes/{id}/objects
pub async fn link_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<LinkSceneObject>,
) -> AppResult<(StatusCode, Json<SceneObjectLink>)> {
    if let Some(significance) = &input.significance {
        validate_one_of("significance", significance, VALID_SIGNIFICANCE)
            .map_err(CoreError::Validation)?;
    }
    let (scene, _) = load_scene(&state.pool, id, &auth, Permission::Edit).await?;

    let object = StoryObjectRepo::find_by_id(&state.pool, input.object_id)
        .await?
        .filter(|o| o.project_id == scene.project_id)
        .ok_or(CoreError::NotFound {
            entity: "StoryObject",
            id: input.object_id,
        })?;

    let link = SceneObjectRepo::link(&state.pool, id, &input).await?;
    tracing::debug!(scene_id = id, object_id = object.id, "Object linked to scene");
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/scenes/{id}/objects/{object_id}
pub async fn unlink_object(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, object_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    load_scene(&state.pool, id, &auth, Permission::Edit).await?;
    if !SceneObjectRepo::unlink(&state.pool, id, object_id).await? {
        return Err(CoreError::NotFound {
            entity: "SceneObject",
            id: object_id,
        }
        .into());
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a scene and check the caller's permission on its project.
async fn load_scene(
    pool: &DbPool,
    id: DbId,
    auth: &AuthUser,
    permission: Permission,
) -> AppResult<(Scene, ProjectMember)> {
    let scene = SceneRepo::find_by_id(pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Scene", id })?;
    let member = require_project(pool, scene.project_id, auth, permission)
        .await
        .map_err(|e| match e {
            // Hide which project a foreign scene belongs to.
            AppError::Core(CoreError::NotFound { .. }) => {
                AppError::Core(CoreError::NotFound { entity: "Scene", id })
            }
            other => other,
        })?;
    Ok((scene, member))
}

fn validate_scene_fields(input: &impl Validate, scene_type: Option<&str>) -> AppResult<()> {
    input.validate().map_err(CoreError::from)?;
    if let Some(scene_type) = scene_type {
        validate_one_of("scene_type", scene_type, VALID_SCENE_TYPES)
            .map_err(CoreError::Validation)?;
    }
    Ok(())
}

fn publish_scene_event(state: &AppState, kind: &str, scene: &Scene, actor: DbId) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(scene.project_id)
            .with_source("scene", scene.id)
            .with_actor(actor)
            .with_payload(json!({ "title": scene.title, "order_index": scene.order_index })),
    );
}
