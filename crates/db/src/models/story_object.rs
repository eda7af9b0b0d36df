//! Story object (character, location, prop, conflict) model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};
use validator::Validate;

/// A row from the `story_objects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoryObject {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub object_type: String,
    pub description: Option<String>,
    pub importance: String,
    pub status: String,
    pub attributes: serde_json::Value,
    pub first_appearance: Option<i32>,
    pub symbolic_meaning: Option<String>,
    pub character_role: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A story object with the number of scenes it appears in.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoryObjectWithUsage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub object: StoryObject,
    pub scene_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateStoryObject {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub object_type: String,
    pub description: Option<String>,
    pub importance: Option<String>,
    pub status: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub first_appearance: Option<i32>,
    pub symbolic_meaning: Option<String>,
    #[validate(length(max = 50))]
    pub character_role: Option<String>,
}

/// DTO for updating a story object. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStoryObject {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub importance: Option<String>,
    pub status: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub first_appearance: Option<i32>,
    pub symbolic_meaning: Option<String>,
    #[validate(length(max = 50))]
    pub character_role: Option<String>,
}
