//! Handlers for the `/projects` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use storyforge_core::billing::has_capacity;
use storyforge_core::collaboration::Permission;
use storyforge_core::error::CoreError;
use storyforge_core::story::{validate_one_of, VALID_PHASES};
use storyforge_core::types::DbId;
use storyforge_db::models::activity::ActivityEvent;
use storyforge_db::models::project::{CreateProject, Project, ProjectListItem, UpdateProject};
use storyforge_db::models::scene::{Scene, SceneObjectLink};
use storyforge_db::models::story_object::StoryObjectWithUsage;
use storyforge_db::repositories::{
    ActivityEventRepo, BillingPlanRepo, ProjectRepo, SceneObjectRepo, UserRepo,
};
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};
use validator::Validate;

use crate::ai::context::StoryContext;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// A project with everything the editor needs on first load.
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    /// `owner`, `editor`, `commenter` or `viewer`.
    pub access_role: &'static str,
    pub scenes: Vec<Scene>,
    pub objects: Vec<StoryObjectWithUsage>,
    pub scene_objects: Vec<SceneObjectLink>,
}

/// GET /api/v1/projects
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<ProjectListItem>>>> {
    let projects = ProjectRepo::list_accessible(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// POST /api/v1/projects
///
/// Enforces the `max_projects` quota of the caller's plan.
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    input.validate().map_err(CoreError::from)?;
    if let Some(phase) = &input.current_phase {
        validate_one_of("current_phase", phase, VALID_PHASES).map_err(CoreError::Validation)?;
    }
    ensure_project_quota(&state.pool, auth.user_id).await?;

    let project = ProjectRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::info!(user_id = auth.user_id, project_id = project.id, "Project created");
    publish_project_event(&state, kinds::PROJECT_CREATED, &project, auth.user_id);

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ProjectDetail>> {
    let member = require_project(&state.pool, id, &auth, Permission::View).await?;
    let ctx = StoryContext::load(&state.pool, id).await?;
    let scene_objects = SceneObjectRepo::list_for_project(&state.pool, id).await?;

    Ok(Json(ProjectDetail {
        project: ctx.project,
        access_role: member.role.as_str(),
        scenes: ctx.scenes,
        objects: ctx.objects,
        scene_objects,
    }))
}

/// PUT /api/v1/projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProject>,
) -> AppResult<Json<Project>> {
    input.validate().map_err(CoreError::from)?;
    if let Some(phase) = &input.current_phase {
        validate_one_of("current_phase", phase, VALID_PHASES).map_err(CoreError::Validation)?;
    }
    require_project(&state.pool, id, &auth, Permission::Edit).await?;

    let project = ProjectRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Project",
            id,
        })?;
    publish_project_event(&state, kinds::PROJECT_UPDATED, &project, auth.user_id);
    Ok(Json(project))
}

/// DELETE /api/v1/projects/{id}
///
/// Owner only. Cascades to scenes, objects, story, collaborators and comments.
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    require_project(&state.pool, id, &auth, Permission::Manage).await?;

    if !ProjectRepo::delete(&state.pool, id).await? {
        return Err(CoreError::NotFound {
            entity: "Project",
            id,
        }
        .into());
    }

    tracing::info!(user_id = auth.user_id, project_id = id, "Project deleted");
    // Not scoped to the project: the activity row would be cascaded away.
    state.event_bus.publish(
        StoryEvent::new(kinds::PROJECT_DELETED)
            .with_source("project", id)
            .with_actor(auth.user_id),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/projects/{id}/activity
pub async fn list_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<ActivityEvent>>>> {
    require_project(&state.pool, id, &auth, Permission::View).await?;
    let events =
        ActivityEventRepo::list_for_project(&state.pool, id, params.limit(), params.offset())
            .await?;
    Ok(Json(DataResponse { data: events }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject with 403 when the user already owns as many projects as their plan allows.
pub async fn ensure_project_quota(pool: &DbPool, user_id: DbId) -> AppResult<()> {
    let user = UserRepo::find_by_id(pool, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user_id,
        })?;

    let Some(plan) = BillingPlanRepo::find_active_by_name(pool, &user.plan).await? else {
        return Ok(());
    };

    let owned = ProjectRepo::count_owned(pool, user_id).await?;
    if !has_capacity(owned, plan.max_projects) {
        return Err(CoreError::Forbidden(format!(
            "The {} plan allows at most {} projects. Upgrade to create more.",
            plan.display_name, plan.max_projects
        ))
        .into());
    }
    Ok(())
}

pub fn publish_project_event(state: &AppState, kind: &str, project: &Project, actor: DbId) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(project.id)
            .with_source("project", project.id)
            .with_actor(actor)
            .with_payload(json!({ "title": project.title })),
    );
}
