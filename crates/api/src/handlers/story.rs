//! Handlers for a project's generated story.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use storyforge_core::ai_response::{
    parse_object, GeneratedStory, RegeneratedChapter, StoryMetadata,
};
use storyforge_core::chapters::auto_chapters;
use storyforge_core::collaboration::Permission;
use storyforge_core::error::CoreError;
use storyforge_core::export::{self, ExportChapter, ExportDocument, ExportFormat};
use storyforge_core::heuristics;
use storyforge_core::prompts::{self, NarrativeOptions};
use storyforge_core::story::{phases, MIN_SCENES_FOR_STORY};
use storyforge_core::tokens::{word_count, OperationType};
use storyforge_core::types::DbId;
use storyforge_db::models::story::{SaveChapter, SaveStory, StoryWithChapters, UpdateStory};
use storyforge_db::repositories::{ProjectRepo, StoryRepo};
use storyforge_events::{kinds, StoryEvent};

use crate::ai::context::{scene_view, StoryContext};
use crate::ai::{complete_or_fallback, Meter};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::response::{ChargedResponse, DataResponse};
use crate::state::AppState;

/// Body for generation and chapter regeneration. Both fields are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    #[serde(alias = "narrativeOptions")]
    pub narrative_options: NarrativeOptions,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Read / edit
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/story
pub async fn get_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<StoryWithChapters>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let story = find_story(&state, project_id).await?;
    Ok(Json(DataResponse { data: story }))
}

/// PUT /api/v1/projects/{id}/story
///
/// Manual edits. A new chapter list replaces the old one and the story text
/// is rebuilt from it; otherwise `content` may be edited directly.
pub async fn update_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Json(input): Json<UpdateStory>,
) -> AppResult<Json<DataResponse<StoryWithChapters>>> {
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;
    let current = find_story(&state, project_id).await?;

    if let Some(title) = &input.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest("Story title must not be empty".into()));
        }
    }

    let chapters = match input.chapters {
        Some(chapters) => chapters,
        None => current
            .chapters
            .iter()
            .map(|c| SaveChapter {
                title: c.title.clone(),
                content: c.content.clone(),
                scene_ids: c.scene_ids.clone(),
            })
            .collect(),
    };
    let content = match input.content {
        Some(content) => content,
        None if chapters.is_empty() => current.story.content.clone(),
        None => join_chapters(&chapters),
    };

    let save = SaveStory {
        title: input.title.unwrap_or(current.story.title),
        premise: input.premise.or(current.story.premise),
        word_count: word_count(&content) as i32,
        content,
        metadata: current.story.metadata,
        chapters,
    };
    let story = StoryRepo::save(&state.pool, project_id, &save).await?;
    publish_story_event(&state, kinds::STORY_UPDATED, &story, auth.user_id, json!({}));

    Ok(Json(DataResponse { data: story }))
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/story/generate
///
/// Writes the whole story from the scene outline, replaces any previous
/// story and moves the project into the `story` phase.
pub async fn generate_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    body: Option<Json<GenerateRequest>>,
) -> AppResult<Json<ChargedResponse<StoryWithChapters>>> {
    let options = body.map(|Json(b)| b.narrative_options).unwrap_or_default();
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;

    let ctx = StoryContext::load(&state.pool, project_id).await?;
    if ctx.scenes.len() < MIN_SCENES_FOR_STORY {
        return Err(AppError::BadRequest(format!(
            "Need at least {MIN_SCENES_FOR_STORY} scenes to generate story"
        )));
    }

    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::GenerateStory,
        &ctx.pricing_text(),
    )
    .await?
    .in_project(project_id);

    let project = ctx.project_view();
    let scenes = ctx.scene_views();
    let (generated, usage) = complete_or_fallback(
        &state.llm,
        &prompts::full_story(&project, &scenes, &ctx.object_views(), &options),
        parse_object::<GeneratedStory>,
        || heuristics::generated_story(&project, &scenes, &options),
    )
    .await;

    let save = to_save_story(generated, &ctx, &options);
    let mut tx = meter.begin(&state).await?;
    let story = StoryRepo::save_in_tx(&mut tx, project_id, &save).await?;
    ProjectRepo::set_phase(
        &mut *tx,
        project_id,
        phases::STORY,
        Some(story.story.word_count),
    )
    .await?;

    let settled = meter.settle_in_tx(&state, tx, &usage).await?;
    publish_story_event(
        &state,
        kinds::STORY_GENERATED,
        &story,
        auth.user_id,
        json!({ "chapters": story.chapters.len(), "word_count": story.story.word_count }),
    );

    Ok(Json(ChargedResponse {
        data: story,
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

/// POST /api/v1/projects/{id}/story/chapters/{index}/regenerate
///
/// Rewrites one chapter from its scenes. `index` is zero-based.
pub async fn regenerate_chapter(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, index)): Path<(DbId, usize)>,
    body: Option<Json<GenerateRequest>>,
) -> AppResult<Json<ChargedResponse<StoryWithChapters>>> {
    let options = body.map(|Json(b)| b.narrative_options).unwrap_or_default();
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;

    let current = find_story(&state, project_id).await?;
    let chapter = current
        .chapters
        .get(index)
        .ok_or_else(|| AppError::BadRequest("Chapter index out of range".into()))?;

    let ctx = StoryContext::load(&state.pool, project_id).await?;
    let scenes: Vec<_> = chapter
        .scene_ids
        .iter()
        .filter_map(|id| ctx.scenes.iter().find(|s| s.id == *id))
        .map(scene_view)
        .collect();
    if scenes.is_empty() {
        return Err(AppError::BadRequest("No scenes found for this chapter".into()));
    }

    let pricing_text: String = scenes
        .iter()
        .map(|s| format!("{} {}", s.title, s.description.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n");
    let meter = Meter::quote(&state, auth.user_id, OperationType::GenerateStory, &pricing_text)
        .await?
        .in_project(project_id);

    let previous = chapter.content.clone();
    let (rewritten, usage) = complete_or_fallback(
        &state.llm,
        &prompts::chapter_rewrite(&ctx.project_view(), &chapter.title, &scenes, &options),
        parse_object::<RegeneratedChapter>,
        || RegeneratedChapter {
            title: chapter.title.clone(),
            content: previous,
        },
    )
    .await;
    let title = Some(rewritten.title.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(chapter.title.as_str())
        .to_string();

    let mut tx = meter.begin(&state).await?;
    let story = StoryRepo::replace_chapter(
        &mut tx,
        current.story.id,
        chapter.sort_order,
        &title,
        &rewritten.content,
    )
    .await?
    .ok_or_else(|| AppError::BadRequest("Chapter index out of range".into()))?;

    let settled = meter.settle_in_tx(&state, tx, &usage).await?;
    publish_story_event(
        &state,
        kinds::CHAPTER_REGENERATED,
        &story,
        auth.user_id,
        json!({ "chapter_index": index }),
    );

    Ok(Json(ChargedResponse {
        data: story,
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{id}/story/export?format=txt|md|html|pdf|docx|epub
///
/// The book formats end with an "About This Story" page built from the
/// generated story metadata.
pub async fn export_story(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let format: ExportFormat = params.format.as_deref().unwrap_or("txt").parse()?;
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let story = find_story(&state, project_id).await?;

    let metadata = story
        .story
        .metadata
        .get("story")
        .cloned()
        .and_then(|value| serde_json::from_value::<StoryMetadata>(value).ok())
        .unwrap_or_default();
    let doc = ExportDocument {
        identifier: format!("story-{}", story.story.id),
        title: story.story.title.clone(),
        premise: story.story.premise.clone(),
        content: story.story.content.clone(),
        chapters: story
            .chapters
            .iter()
            .map(|c| ExportChapter {
                title: c.title.clone(),
                content: c.content.clone(),
            })
            .collect(),
        metadata,
        modified: story.story.updated_at,
    };
    let body = export::render(&doc, format)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(&doc.title, format)
    );

    tracing::info!(project_id, user_id = auth.user_id, format = format.extension(), "Story exported");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_story(state: &AppState, project_id: DbId) -> AppResult<StoryWithChapters> {
    StoryRepo::find_for_project(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Story",
            id: project_id,
        }))
}

fn join_chapters(chapters: &[SaveChapter]) -> String {
    chapters
        .iter()
        .map(|c| c.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turn a model (or heuristic) story into a full replacement, falling back
/// to automatic chapters when the model returned none.
fn to_save_story(
    generated: GeneratedStory,
    ctx: &StoryContext,
    options: &NarrativeOptions,
) -> SaveStory {
    let chapters = match generated.chapters {
        Some(chapters) if !chapters.is_empty() => chapters,
        _ => auto_chapters(&ctx.scene_ids(), &generated.content),
    };
    let chapters: Vec<SaveChapter> = chapters
        .into_iter()
        .map(|c| SaveChapter {
            title: c.title,
            content: c.content,
            scene_ids: c.scenes,
        })
        .collect();

    let content = if generated.content.trim().is_empty() {
        join_chapters(&chapters)
    } else {
        generated.content
    };
    let title = Some(generated.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| ctx.project.title.clone());
    let metadata = json!({
        "story": generated.metadata.unwrap_or_default(),
        "narrative_options": options,
    });

    SaveStory {
        title,
        premise: Some(generated.premise).filter(|p| !p.trim().is_empty()),
        word_count: word_count(&content) as i32,
        content,
        metadata,
        chapters,
    }
}

fn publish_story_event(
    state: &AppState,
    kind: &str,
    story: &StoryWithChapters,
    actor: DbId,
    payload: serde_json::Value,
) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .in_project(story.story.project_id)
            .with_source("story", story.story.id)
            .with_actor(actor)
            .with_payload(payload),
    );
}
