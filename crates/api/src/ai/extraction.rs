//! Turning extracted object names into story objects linked to a scene.

use sqlx::{Postgres, Transaction};
use storyforge_core::ai_response::{parse_object, ExtractedObjects};
use storyforge_core::story::{normalize_object_name, object_status};
use storyforge_core::types::DbId;
use storyforge_core::{heuristics, prompts};
use storyforge_db::models::project::Project;
use storyforge_db::models::story_object::{StoryObject, UpdateStoryObject};
use storyforge_db::repositories::{SceneObjectRepo, StoryObjectRepo};
use storyforge_llm::LlmClient;

use super::{complete_or_fallback, AiUsage};
use crate::error::AppResult;

/// Ask the model which characters, locations, props and conflicts appear in
/// a scene description.
pub async fn extract_scene_objects(
    llm: &LlmClient,
    project: &Project,
    description: &str,
) -> (ExtractedObjects, AiUsage) {
    let context = format!(
        "Project: {}\nGenre: {}\nDescription: {}",
        project.title,
        project.genre.as_deref().unwrap_or("not specified"),
        project.description.as_deref().unwrap_or("")
    );
    let prompt = prompts::scene_objects(description, &context);
    complete_or_fallback(llm, &prompt, parse_object::<ExtractedObjects>, || {
        heuristics::scene_objects(description)
    })
    .await
}

/// Find or create each extracted object in the project, reactivate unused
/// ones and, when `scene_id` is given, link them to that scene. Runs in the
/// caller's transaction so the objects commit with the operation's charge.
///
/// Returns the objects touched, without duplicates.
pub async fn apply_extracted_objects(
    tx: &mut Transaction<'_, Postgres>,
    project_id: DbId,
    scene_id: Option<DbId>,
    extracted: &ExtractedObjects,
    origin: &str,
) -> AppResult<Vec<StoryObject>> {
    let mut touched: Vec<StoryObject> = Vec::new();

    for (kind, raw_name) in extracted.by_kind() {
        let Some(name) = normalize_object_name(&raw_name) else {
            continue;
        };
        let note = format!("Recognized by AI in {origin}");
        let mut object = StoryObjectRepo::find_or_create(
            &mut **tx,
            project_id,
            kind.as_str(),
            &name,
            Some(&note),
        )
        .await?;

        if object.status == object_status::UNUSED {
            let reactivate = UpdateStoryObject {
                status: Some(object_status::ACTIVE.to_string()),
                ..Default::default()
            };
            if let Some(updated) =
                StoryObjectRepo::update(&mut **tx, object.id, &reactivate).await?
            {
                object = updated;
            }
        }

        if let Some(scene_id) = scene_id {
            SceneObjectRepo::link_if_missing(
                &mut **tx,
                scene_id,
                object.id,
                kind.default_significance(),
            )
            .await?;
        }

        if !touched.iter().any(|o| o.id == object.id) {
            touched.push(object);
        }
    }

    tracing::debug!(project_id, ?scene_id, count = touched.len(), "Applied extracted objects");
    Ok(touched)
}
