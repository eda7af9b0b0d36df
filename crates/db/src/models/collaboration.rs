//! Project collaborator and comment models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// ProjectCollaborator
// ---------------------------------------------------------------------------

/// A row from the `project_collaborators` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectCollaborator {
    pub id: DbId,
    pub project_id: DbId,
    pub user_id: DbId,
    pub invited_by: Option<DbId>,
    pub role: String,
    pub permissions: serde_json::Value,
    pub status: String,
    #[serde(skip_serializing)]
    pub invitation_token: Option<String>,
    pub invited_at: Timestamp,
    pub joined_at: Option<Timestamp>,
    pub last_access: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// A collaborator joined with the user's name and email.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CollaboratorWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub collaborator: ProjectCollaborator,
    pub username: String,
    pub email: String,
}

pub struct CreateInvitation {
    pub project_id: DbId,
    pub user_id: DbId,
    pub invited_by: DbId,
    pub role: String,
    pub permissions: serde_json::Value,
    pub invitation_token: String,
}

/// Aggregates backing the collaboration analytics endpoint.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct CollaborationCounts {
    pub total_collaborators: i64,
    pub active_collaborators: i64,
    pub total_comments: i64,
    pub resolved_comments: i64,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A row from the `comments` table joined with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: DbId,
    pub project_id: DbId,
    pub scene_id: Option<DbId>,
    pub user_id: DbId,
    pub username: String,
    pub parent_comment_id: Option<DbId>,
    pub thread_depth: i32,
    pub content: String,
    pub comment_type: String,
    pub position_data: Option<serde_json::Value>,
    pub is_resolved: bool,
    pub resolved_by: Option<DbId>,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for a new comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub content: String,
    pub scene_id: Option<DbId>,
    pub parent_comment_id: Option<DbId>,
    pub comment_type: Option<String>,
    pub position_data: Option<serde_json::Value>,
}
