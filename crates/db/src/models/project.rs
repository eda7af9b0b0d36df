//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};
use validator::Validate;

/// A project row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub current_phase: String,
    pub target_word_count: i32,
    pub current_word_count: i32,
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub estimated_scope: Option<String>,
    pub marketability: i32,
    pub original_idea: Option<String>,
    pub attributes: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A project with its scene count, for list views.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub scene_count: i64,
    /// `"owner"` or the caller's collaborator role.
    pub access_role: String,
}

/// DTO for creating a new project. The owner comes from the session.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    pub current_phase: Option<String>,
    #[validate(range(min = 1, max = 10_000_000))]
    pub target_word_count: Option<i32>,
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub estimated_scope: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub marketability: Option<i32>,
    pub original_idea: Option<String>,
    pub attributes: Option<serde_json::Value>,
}

/// DTO for updating an existing project. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProject {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    pub current_phase: Option<String>,
    #[validate(range(min = 1, max = 10_000_000))]
    pub target_word_count: Option<i32>,
    pub current_word_count: Option<i32>,
    pub tone: Option<String>,
    pub target_audience: Option<String>,
    pub estimated_scope: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub marketability: Option<i32>,
    pub attributes: Option<serde_json::Value>,
}
