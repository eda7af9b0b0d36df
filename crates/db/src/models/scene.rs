//! Scene entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};
use validator::Validate;

/// A row from the `scenes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub id: DbId,
    pub project_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub scene_type: String,
    pub order_index: i32,
    pub location: Option<String>,
    pub conflict: Option<String>,
    pub emotional_intensity: f64,
    pub word_count: i32,
    pub dialog_count: i32,
    pub hook: Option<String>,
    pub character_focus: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a scene. Without `order_index` the scene is appended.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateScene {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub scene_type: Option<String>,
    pub order_index: Option<i32>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub conflict: Option<String>,
    pub emotional_intensity: Option<f64>,
    pub hook: Option<String>,
    #[validate(length(max = 200))]
    pub character_focus: Option<String>,
}

/// DTO for updating a scene. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateScene {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub scene_type: Option<String>,
    pub order_index: Option<i32>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub conflict: Option<String>,
    pub emotional_intensity: Option<f64>,
    pub word_count: Option<i32>,
    pub dialog_count: Option<i32>,
    pub hook: Option<String>,
    #[validate(length(max = 200))]
    pub character_focus: Option<String>,
}

/// A link between a scene and a story object, joined with the object's
/// name and type.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SceneObjectLink {
    pub id: DbId,
    pub scene_id: DbId,
    pub object_id: DbId,
    pub name: String,
    pub object_type: String,
    pub role: Option<String>,
    pub transformation: Option<String>,
    pub significance: String,
    pub interaction_type: Option<String>,
}

/// DTO for linking an object to a scene.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSceneObject {
    pub object_id: DbId,
    pub role: Option<String>,
    pub transformation: Option<String>,
    pub significance: Option<String>,
    pub interaction_type: Option<String>,
}
