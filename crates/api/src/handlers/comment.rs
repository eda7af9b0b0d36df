//! Handlers for threaded project comments.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use storyforge_core::collaboration::{
    Permission, MAX_COMMENT_LENGTH, MAX_THREAD_DEPTH, VALID_COMMENT_TYPES,
};
use storyforge_core::error::CoreError;
use storyforge_core::story::validate_one_of;
use storyforge_core::types::DbId;
use storyforge_db::models::collaboration::{Comment, CreateComment};
use storyforge_db::repositories::{CommentRepo, SceneRepo};
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    pub scene_id: Option<DbId>,
}

/// GET /api/v1/projects/{id}/comments?scene_id=
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Query(filter): Query<CommentFilter>,
) -> AppResult<Json<DataResponse<Vec<Comment>>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let comments = CommentRepo::list_for_project(&state.pool, project_id, filter.scene_id).await?;
    Ok(Json(DataResponse { data: comments }))
}

/// POST /api/v1/projects/{id}/comments
///
/// Replies sit one level below their parent, up to the maximum thread depth.
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(mut input): Json<CreateComment>,
) -> AppResult<(StatusCode, Json<DataResponse<Comment>>)> {
    input.content = input.content.trim().to_string();
    validate_comment(&input)?;
    require_project(&state.pool, project_id, &auth, Permission::Comment).await?;

    if let Some(scene_id) = input.scene_id {
        let in_project = SceneRepo::find_by_id(&state.pool, scene_id)
            .await?
            .is_some_and(|s| s.project_id == project_id);
        if !in_project {
            return Err(AppError::BadRequest(
                "scene_id does not belong to this project".into(),
            ));
        }
    }

    let depth = reply_depth(&state.pool, project_id, input.parent_comment_id).await?;
    let comment = CommentRepo::create(&state.pool, project_id, auth.user_id, depth, &input).await?;

    publish_comment_event(
        &state,
        kinds::COMMENT_CREATED,
        &comment,
        auth.user_id,
        json!({
            "scene_id": comment.scene_id,
            "parent_comment_id": comment.parent_comment_id,
            "comment_type": comment.comment_type,
            "username": comment.username,
        }),
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: comment })))
}

/// POST /api/v1/comments/{id}/resolve
pub async fn resolve_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let comment = find_comment(&state.pool, id).await?;
    require_project(&state.pool, comment.project_id, &auth, Permission::Comment).await?;

    let comment = CommentRepo::resolve(&state.pool, id, auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Comment",
            id,
        })?;
    publish_comment_event(&state, kinds::COMMENT_RESOLVED, &comment, auth.user_id, json!({}));
    Ok(Json(DataResponse { data: comment }))
}

/// DELETE /api/v1/comments/{id}
///
/// Authors delete their own comments; the project owner deletes any.
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let comment = find_comment(&state.pool, id).await?;
    let member = require_project(&state.pool, comment.project_id, &auth, Permission::View).await?;
    if comment.user_id != auth.user_id && !member.can(Permission::Manage) {
        return Err(CoreError::Forbidden(
            "Only the author or the project owner can delete a comment".into(),
        )
        .into());
    }

    CommentRepo::delete(&state.pool, id).await?;
    publish_comment_event(&state, kinds::COMMENT_DELETED, &comment, auth.user_id, json!({}));
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_comment(input: &CreateComment) -> Result<(), CoreError> {
    if input.content.is_empty() {
        return Err(CoreError::Validation("Comment content must not be empty".into()));
    }
    if input.content.chars().count() as u64 > MAX_COMMENT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Comment content must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    if let Some(kind) = input.comment_type.as_deref() {
        validate_one_of("comment_type", kind, VALID_COMMENT_TYPES).map_err(CoreError::Validation)?;
    }
    Ok(())
}

/// Depth for a new comment: 0 at the top level, parent depth plus one for a
/// reply.
async fn reply_depth(pool: &DbPool, project_id: DbId, parent_id: Option<DbId>) -> AppResult<i32> {
    let Some(parent_id) = parent_id else {
        return Ok(0);
    };
    let parent = CommentRepo::find_by_id(pool, parent_id)
        .await?
        .filter(|p| p.project_id == project_id)
        .ok_or_else(|| {
            AppError::BadRequest("parent_comment_id does not belong to this project".into())
        })?;

    let depth = parent.thread_depth + 1;
    if depth > MAX_THREAD_DEPTH {
        return Err(AppError::BadRequest(format!(
            "Replies cannot be nested more than {MAX_THREAD_DEPTH} levels deep"
        )));
    }
    Ok(depth)
}

async fn find_comment(pool: &DbPool, id: DbId) -> AppResult<Comment> {
    CommentRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Comment",
                id,
            }
            .into()
        })
}

fn publish_comment_event(
    state: &AppState,
    kind: &str,
    comment: &Comment,
    actor: DbId,
    payload: serde_json::Value,
) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(comment.project_id)
            .with_source("comment", comment.id)
            .with_actor(actor)
            .with_payload(payload),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(content: &str, kind: Option<&str>) -> CreateComment {
        CreateComment {
            content: content.to_string(),
            scene_id: None,
            parent_comment_id: None,
            comment_type: kind.map(str::to_string),
            position_data: None,
        }
    }

    #[test]
    fn empty_and_overlong_comments_are_rejected() {
        assert!(validate_comment(&comment("", None)).is_err());
        let long = "x".repeat(MAX_COMMENT_LENGTH as usize + 1);
        assert!(validate_comment(&comment(&long, None)).is_err());
        assert!(validate_comment(&comment("Nice pacing", None)).is_ok());
    }

    #[test]
    fn comment_type_must_be_known() {
        assert!(validate_comment(&comment("ok", Some("praise"))).is_ok());
        assert!(validate_comment(&comment("ok", Some("rant"))).is_err());
    }
}
