//! Generated story and chapter models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};

/// A row from the `stories` table. At most one per project.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Story {
    pub id: DbId,
    pub project_id: DbId,
    pub title: String,
    pub premise: Option<String>,
    pub content: String,
    pub metadata: serde_json::Value,
    pub word_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `story_chapters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoryChapter {
    pub id: DbId,
    pub story_id: DbId,
    pub title: String,
    pub content: String,
    pub scene_ids: Vec<DbId>,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A story together with its ordered chapters.
#[derive(Debug, Clone, Serialize)]
pub struct StoryWithChapters {
    #[serde(flatten)]
    pub story: Story,
    pub chapters: Vec<StoryChapter>,
}

/// Full replacement of a project's story and chapters.
#[derive(Debug, Clone)]
pub struct SaveStory {
    pub title: String,
    pub premise: Option<String>,
    pub content: String,
    pub metadata: serde_json::Value,
    pub word_count: i32,
    pub chapters: Vec<SaveChapter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveChapter {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub scene_ids: Vec<DbId>,
}

/// DTO for manual story edits. All fields are optional; `chapters`, when
/// present, replaces the whole chapter list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStory {
    pub title: Option<String>,
    pub premise: Option<String>,
    pub content: Option<String>,
    pub chapters: Option<Vec<SaveChapter>>,
}
