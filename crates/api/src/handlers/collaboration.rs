//! Handlers for project collaborators, invitations, presence and
//! collaboration analytics.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storyforge_core::billing::has_capacity;
use storyforge_core::collaboration::{
    collaboration_score, validate_invitable_role, CollabMessage, Permission, PresenceUser,
};
use storyforge_core::error::CoreError;
use storyforge_core::types::DbId;
use storyforge_db::models::collaboration::{
    CollaborationCounts, CollaboratorWithUser, CreateInvitation, ProjectCollaborator,
};
use storyforge_db::repositories::{BillingPlanRepo, CollaboratorRepo, UserRepo};
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::manager::collab_frame;

/// Length of the random invitation token.
const INVITATION_TOKEN_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// Email or username of the user to invite.
    #[serde(alias = "email", alias = "username")]
    pub login: String,
    pub role: String,
    pub permissions: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub collaborator: ProjectCollaborator,
    /// Shared with the invitee out of band (or over the WebSocket).
    pub invitation_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
    pub permissions: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CollaborationAnalytics {
    #[serde(flatten)]
    pub counts: CollaborationCounts,
    pub online_now: usize,
    pub collaboration_score: f64,
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/collaborators
pub async fn list_collaborators(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<CollaboratorWithUser>>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let collaborators = CollaboratorRepo::list_for_project(&state.pool, project_id).await?;
    Ok(Json(DataResponse {
        data: collaborators,
    }))
}

/// POST /api/v1/projects/{id}/collaborators
///
/// Owner only. Seats (pending plus active) are limited by the owner's plan.
pub async fn invite_collaborator(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<InviteRequest>,
) -> AppResult<(StatusCode, Json<InvitationResponse>)> {
    let role = validate_invitable_role(&input.role).map_err(CoreError::Validation)?;
    let member = require_project(&state.pool, project_id, &auth, Permission::Manage).await?;

    let invitee = UserRepo::find_by_login(&state.pool, input.login.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::BadRequest("No active user with that email or username".into()))?;
    if invitee.id == member.owner_id {
        return Err(AppError::BadRequest(
            "The project owner cannot be invited".into(),
        ));
    }

    ensure_seat_available(&state.pool, project_id, member.owner_id).await?;

    let token = generate_invitation_token();
    let collaborator = CollaboratorRepo::invite(
        &state.pool,
        &CreateInvitation {
            project_id,
            user_id: invitee.id,
            invited_by: auth.user_id,
            role: role.as_str().to_string(),
            permissions: input.permissions.unwrap_or_else(|| json!({})),
            invitation_token: token.clone(),
        },
    )
    .await?
    .ok_or_else(|| {
        CoreError::Conflict(format!(
            "{} is already invited to or collaborating on this project",
            invitee.username
        ))
    })?;

    publish_collaborator_event(
        &state,
        kinds::COLLABORATOR_INVITED,
        &collaborator,
        auth.user_id,
        json!({ "username": invitee.username, "role": collaborator.role }),
    );

    // The invitee is not in the project room yet; tell them directly.
    let notice = CollabMessage::ProjectEvent {
        project_id,
        event_type: kinds::COLLABORATOR_INVITED.to_string(),
        actor_user_id: Some(auth.user_id),
        payload: json!({ "role": collaborator.role, "invitation_token": token }),
    };
    state
        .ws_manager
        .send_to_user(invitee.id, collab_frame(&notice))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse {
            collaborator,
            invitation_token: token,
        }),
    ))
}

/// PUT /api/v1/projects/{id}/collaborators/{user_id}
pub async fn update_collaborator(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, user_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateRoleRequest>,
) -> AppResult<Json<DataResponse<ProjectCollaborator>>> {
    let role = validate_invitable_role(&input.role).map_err(CoreError::Validation)?;
    require_project(&state.pool, project_id, &auth, Permission::Manage).await?;

    let collaborator = CollaboratorRepo::update_role(
        &state.pool,
        project_id,
        user_id,
        role.as_str(),
        input.permissions.as_ref(),
    )
    .await?
    .ok_or(CoreError::NotFound {
        entity: "Collaborator",
        id: user_id,
    })?;

    publish_collaborator_event(
        &state,
        kinds::COLLABORATOR_UPDATED,
        &collaborator,
        auth.user_id,
        json!({ "role": collaborator.role }),
    );
    Ok(Json(DataResponse { data: collaborator }))
}

/// DELETE /api/v1/projects/{id}/collaborators/{user_id}
///
/// The owner may remove anyone; a collaborator may remove themselves.
pub async fn remove_collaborator(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    let permission = if user_id == auth.user_id {
        Permission::View
    } else {
        Permission::Manage
    };
    require_project(&state.pool, project_id, &auth, permission).await?;

    if !CollaboratorRepo::remove(&state.pool, project_id, user_id).await? {
        return Err(CoreError::NotFound {
            entity: "Collaborator",
            id: user_id,
        }
        .into());
    }

    state.presence.leave(project_id, user_id).await;
    state.event_bus.publish(
        StoryEvent::new(kinds::COLLABORATOR_REMOVED)
            .in_project(project_id)
            .with_source("user", user_id)
            .with_actor(auth.user_id),
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

/// POST /api/v1/collaboration/invitations/{token}/accept
pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> AppResult<Json<DataResponse<ProjectCollaborator>>> {
    respond_to_invitation(&state, &auth, &token, true).await
}

/// POST /api/v1/collaboration/invitations/{token}/decline
pub async fn decline_invitation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> AppResult<Json<DataResponse<ProjectCollaborator>>> {
    respond_to_invitation(&state, &auth, &token, false).await
}

async fn respond_to_invitation(
    state: &AppState,
    auth: &AuthUser,
    token: &str,
    accept: bool,
) -> AppResult<Json<DataResponse<ProjectCollaborator>>> {
    let collaborator = CollaboratorRepo::respond(&state.pool, token, auth.user_id, accept)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invitation not found or already answered".into()))?;

    let kind = if accept {
        kinds::COLLABORATOR_JOINED
    } else {
        kinds::COLLABORATOR_DECLINED
    };
    publish_collaborator_event(
        state,
        kind,
        &collaborator,
        auth.user_id,
        json!({ "role": collaborator.role }),
    );
    tracing::info!(
        project_id = collaborator.project_id,
        user_id = auth.user_id,
        accept,
        "Invitation answered"
    );
    Ok(Json(DataResponse { data: collaborator }))
}

// ---------------------------------------------------------------------------
// Presence and analytics
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/presence
pub async fn get_presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<PresenceUser>>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let users = state.presence.users(project_id).await;
    Ok(Json(DataResponse { data: users }))
}

/// GET /api/v1/projects/{id}/collaboration/analytics
pub async fn collaboration_analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<CollaborationAnalytics>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let counts = CollaboratorRepo::counts(&state.pool, project_id).await?;
    let online_now = state.presence.users(project_id).await.len();
    let score = collaboration_score(
        counts.total_collaborators,
        counts.active_collaborators,
        counts.total_comments,
    );

    Ok(Json(DataResponse {
        data: CollaborationAnalytics {
            counts,
            online_now,
            collaboration_score: score,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_invitation_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(INVITATION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

async fn ensure_seat_available(pool: &DbPool, project_id: DbId, owner_id: DbId) -> AppResult<()> {
    let Some(owner) = UserRepo::find_by_id(pool, owner_id).await? else {
        return Ok(());
    };
    let Some(plan) = BillingPlanRepo::find_active_by_name(pool, &owner.plan).await? else {
        return Ok(());
    };

    let seats = CollaboratorRepo::count_seats(pool, project_id).await?;
    if !has_capacity(seats, plan.max_collaborators) {
        return Err(CoreError::Forbidden(format!(
            "The {} plan allows at most {} collaborators per project",
            plan.display_name, plan.max_collaborators
        ))
        .into());
    }
    Ok(())
}

fn publish_collaborator_event(
    state: &AppState,
    kind: &str,
    collaborator: &ProjectCollaborator,
    actor: DbId,
    payload: serde_json::Value,
) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(collaborator.project_id)
            .with_source("collaborator", collaborator.id)
            .with_actor(actor)
            .with_payload(payload),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_tokens_are_alphanumeric() {
        let token = generate_invitation_token();
        assert_eq!(token.len(), INVITATION_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_invitation_token());
    }
}
