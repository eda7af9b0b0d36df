//! Handlers for the `/ai` resource and per-project AI analysis.
//!
//! Every charged handler follows the [`Meter`] sequence: quote, complete
//! with heuristic fallback, settle.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Postgres, Transaction};
use storyforge_core::ai_response::{
    parse_object, parse_scene_suggestions, parse_structure_analysis, Critique,
    ExtractedObjects, FirstSceneSuggestion, IdeaAnalysis, SceneSuggestion, StructureAnalysis,
    StorySummary,
};
use storyforge_core::collaboration::Permission;
use storyforge_core::critics::{self, Critic};
use storyforge_core::error::CoreError;
use storyforge_core::story::{
    phases, scene_types, significance, validate_one_of, ObjectKind, VALID_SCENE_TYPES,
};
use storyforge_core::tokens::{
    check_balance, estimate, BalanceCheck, CostEstimate, OperationType, MAX_EXPECTED_OUTPUT_TOKENS,
};
use storyforge_core::types::DbId;
use storyforge_core::{heuristics, prompts};
use storyforge_db::models::project::{CreateProject, Project};
use storyforge_db::models::scene::{CreateScene, Scene};
use storyforge_db::models::story_object::StoryObject;
use storyforge_db::repositories::{ProjectRepo, SceneObjectRepo, SceneRepo, UserRepo};
use storyforge_events::kinds;
use storyforge_llm::LlmStatus;
use validator::Validate;

use crate::ai::context::StoryContext;
use crate::ai::extraction::apply_extracted_objects;
use crate::ai::{complete_or_fallback, AiUsage, Meter};
use crate::error::{AppError, AppResult};
use crate::handlers::project::{ensure_project_quota, publish_project_event};
use crate::middleware::auth::AuthUser;
use crate::middleware::project_access::require_project;
use crate::response::ChargedResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /ai/analyze-idea`.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeIdeaRequest {
    #[serde(alias = "idea")]
    #[validate(length(min = 10, max = 20000, message = "Idea text must be 10-20000 characters"))]
    pub idea_text: String,
    /// Optional hint such as `short-story` or `screenplay`.
    pub story_intent: Option<String>,
}

/// Request body for `POST /ai/create-project-from-idea`.
///
/// Clients normally send back the (possibly edited) result of
/// `analyze-idea`. When `project_title` is absent the idea is analyzed first.
#[derive(Debug, Default, Deserialize)]
pub struct CreateFromIdeaRequest {
    pub idea_text: Option<String>,
    pub story_intent: Option<String>,
    pub project_title: Option<String>,
    pub project_description: Option<String>,
    pub project_genre: Option<String>,
    pub first_scene: Option<FirstSceneSuggestion>,
    pub extracted_objects: Option<ExtractedObjects>,
}

#[derive(Debug, Serialize)]
pub struct CreatedFromIdea {
    pub project: Project,
    pub objects_created: usize,
    pub scene_created: Option<Scene>,
}

/// Request body for `POST /ai/estimate`.
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub operation_type: String,
    #[serde(default)]
    pub input_text: String,
    pub expected_output_tokens: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub estimate: CostEstimate,
    pub balance: BalanceCheck,
}

#[derive(Debug, Serialize)]
pub struct StructureResult {
    pub analysis: StructureAnalysis,
    pub critique: Critique,
}

#[derive(Debug, Serialize)]
pub struct CriticsResult {
    /// Keyed `structure`, `characters`, `object_flow`.
    pub critiques: BTreeMap<&'static str, Critique>,
    pub overall_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Idea handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/ai/analyze-idea
pub async fn analyze_idea(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<AnalyzeIdeaRequest>,
) -> AppResult<Json<ChargedResponse<IdeaAnalysis>>> {
    let idea = input.idea_text.trim().to_string();
    input.validate().map_err(CoreError::from)?;

    let meter = Meter::quote(&state, auth.user_id, OperationType::AnalyzeIdea, &idea).await?;
    let (analysis, usage) = run_idea_analysis(&state, &idea, input.story_intent.as_deref()).await;
    let settled = meter.settle(&state, &usage).await?;

    Ok(Json(ChargedResponse {
        data: analysis,
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

/// POST /api/v1/ai/create-project-from-idea
///
/// Creates the project in the `expand` phase, its extracted objects and,
/// when the suggestion has a title and description, the first scene.
pub async fn create_project_from_idea(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateFromIdeaRequest>,
) -> AppResult<(StatusCode, Json<ChargedResponse<CreatedFromIdea>>)> {
    let idea = input
        .idea_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let given_title = input
        .project_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    if given_title.is_none() && idea.is_none() {
        return Err(AppError::BadRequest(
            "Project title or idea text is required".into(),
        ));
    }
    ensure_project_quota(&state.pool, auth.user_id).await?;

    let pricing_text = idea.clone().or_else(|| given_title.clone()).unwrap_or_default();
    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::CreateProjectFromIdea,
        &pricing_text,
    )
    .await?;

    // Analyze only when the client did not bring its own analysis.
    let (analysis, usage) = match (&given_title, &idea) {
        (None, Some(idea)) => run_idea_analysis(&state, idea, input.story_intent.as_deref()).await,
        _ => (IdeaAnalysis::default(), AiUsage::default()),
    };
    let analyzed = given_title.is_none();

    let title = given_title.unwrap_or_else(|| analysis.project_suggestions.title.clone());
    let description = input
        .project_description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| analyzed.then(|| analysis.project_suggestions.description.clone()));
    let genre = input
        .project_genre
        .clone()
        .or_else(|| analyzed.then(|| analysis.story_assessment.genre.clone()));

    let create = CreateProject {
        title,
        description,
        genre,
        current_phase: Some(phases::EXPAND.to_string()),
        target_word_count: analyzed
            .then(|| analysis.project_suggestions.target_word_count())
            .flatten(),
        tone: analyzed.then(|| analysis.story_assessment.tone.clone()),
        target_audience: analyzed.then(|| analysis.story_assessment.target_audience.clone()),
        estimated_scope: analyzed.then(|| analysis.story_assessment.estimated_scope.clone()),
        marketability: analyzed.then(|| analysis.story_assessment.marketability_score()),
        original_idea: idea.clone(),
        attributes: input
            .story_intent
            .as_ref()
            .map(|intent| json!({ "story_intent": intent })),
    };
    create.validate().map_err(CoreError::from)?;

    // The project, its objects and first scene commit only with the charge.
    let mut tx = meter.begin(&state).await?;
    let project = ProjectRepo::create(&mut *tx, auth.user_id, &create).await?;

    let extracted = input
        .extracted_objects
        .clone()
        .unwrap_or_else(|| analysis.extracted_objects.clone());
    let objects = apply_extracted_objects(
        &mut tx,
        project.id,
        None,
        &extracted,
        "the original idea",
    )
    .await?;

    let first_scene = input
        .first_scene
        .clone()
        .or_else(|| analyzed.then(|| analysis.first_scene_suggestion.clone()));
    let scene_created = match first_scene {
        Some(suggestion) => create_first_scene(&mut tx, project.id, &suggestion, &objects).await?,
        None => None,
    };

    let settled = meter
        .in_project(project.id)
        .settle_in_tx(&state, tx, &usage)
        .await?;
    publish_project_event(&state, kinds::PROJECT_CREATED, &project, auth.user_id);
    tracing::info!(
        user_id = auth.user_id,
        project_id = project.id,
        objects = objects.len(),
        scene = scene_created.is_some(),
        "Project created from idea"
    );

    Ok((
        StatusCode::CREATED,
        Json(ChargedResponse {
            data: CreatedFromIdea {
                project,
                objects_created: objects.len(),
                scene_created,
            },
            tokens_used: settled.tokens_used,
            remaining_tokens: settled.remaining_tokens,
            fallback: usage.fallback,
        }),
    ))
}

/// POST /api/v1/ai/estimate
///
/// Price an operation and compare it with the caller's balance. Free.
pub async fn estimate_cost(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<EstimateRequest>,
) -> AppResult<Json<EstimateResponse>> {
    let op: OperationType = input.operation_type.parse()?;
    if let Some(expected) = input.expected_output_tokens {
        if !(0..=MAX_EXPECTED_OUTPUT_TOKENS).contains(&expected) {
            return Err(AppError::BadRequest(format!(
                "expected_output_tokens must be between 0 and {MAX_EXPECTED_OUTPUT_TOKENS}"
            )));
        }
    }
    let quote = estimate(op, &input.input_text, input.expected_output_tokens);

    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        })?;
    let balance = check_balance(user.tokens_limit, user.tokens_used, quote.estimated_total_cost);

    Ok(Json(EstimateResponse {
        estimate: quote,
        balance,
    }))
}

/// GET /api/v1/ai/status
pub async fn ai_status(State(state): State<AppState>, _auth: AuthUser) -> Json<LlmStatus> {
    Json(state.llm.status())
}

// ---------------------------------------------------------------------------
// Project analysis handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/analyze-structure
///
/// Structure analysis plus Professor Syntax's critique. Needs a scene.
pub async fn analyze_structure(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<ChargedResponse<StructureResult>>> {
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;
    let ctx = StoryContext::load(&state.pool, project_id).await?;
    if ctx.scenes.is_empty() {
        return Err(AppError::BadRequest("No scenes found".into()));
    }

    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::AnalyzeStructure,
        &ctx.pricing_text(),
    )
    .await?
    .in_project(project_id);

    let project = ctx.project_view();
    let scenes = ctx.scene_views();
    let scene_count = scenes.len();

    let (analysis, analysis_usage) = complete_or_fallback(
        &state.llm,
        &prompts::structure_analysis(&project, &scenes),
        |text| parse_structure_analysis(text, scene_count),
        || heuristics::structure_analysis(&scenes),
    )
    .await;
    let (critique, critique_usage) =
        run_critic(&state, Critic::ProfessorSyntax, &ctx).await;

    let usage = analysis_usage.merge(critique_usage);
    let settled = meter.settle(&state, &usage).await?;

    Ok(Json(ChargedResponse {
        data: StructureResult { analysis, critique },
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

/// POST /api/v1/projects/{id}/suggest-scenes
pub async fn suggest_scenes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<ChargedResponse<Vec<SceneSuggestion>>>> {
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;
    let ctx = StoryContext::load(&state.pool, project_id).await?;

    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::SuggestScenes,
        &ctx.pricing_text(),
    )
    .await?
    .in_project(project_id);

    let objects = ctx.object_views();
    let (suggestions, usage) = complete_or_fallback(
        &state.llm,
        &prompts::next_scenes(&ctx.project_view(), &ctx.scene_views(), &objects),
        parse_scene_suggestions,
        || heuristics::scene_suggestions(&objects),
    )
    .await;
    let settled = meter.settle(&state, &usage).await?;

    Ok(Json(ChargedResponse {
        data: suggestions,
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

/// POST /api/v1/projects/{id}/summarize
///
/// Story summary, charged as `analyze_structure`. Scene and object counts
/// and character names always come from the project, not the model.
pub async fn summarize(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<ChargedResponse<StorySummary>>> {
    require_project(&state.pool, project_id, &auth, Permission::View).await?;
    let ctx = StoryContext::load(&state.pool, project_id).await?;

    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::AnalyzeStructure,
        &ctx.pricing_text(),
    )
    .await?
    .in_project(project_id);

    let project = ctx.project_view();
    let scenes = ctx.scene_views();
    let objects = ctx.object_views();
    let (mut summary, usage) = complete_or_fallback(
        &state.llm,
        &prompts::story_summary(&project, &scenes, &objects),
        parse_object::<StorySummary>,
        || heuristics::story_summary(&project, &scenes, &objects),
    )
    .await;

    let local = heuristics::story_summary(&project, &scenes, &objects);
    summary.scene_count = local.scene_count;
    summary.object_count = local.object_count;
    summary.characters = local.characters;
    if summary.title.trim().is_empty() {
        summary.title = project.title.clone();
    }

    let settled = meter.settle(&state, &usage).await?;
    Ok(Json(ChargedResponse {
        data: summary,
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

/// POST /api/v1/projects/{id}/critics
///
/// Feedback from all three critic personas.
pub async fn run_critics(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<ChargedResponse<CriticsResult>>> {
    require_project(&state.pool, project_id, &auth, Permission::Edit).await?;
    let ctx = StoryContext::load(&state.pool, project_id).await?;

    let meter = Meter::quote(
        &state,
        auth.user_id,
        OperationType::AiCritics,
        &ctx.pricing_text(),
    )
    .await?
    .in_project(project_id);

    let mut critiques = BTreeMap::new();
    let mut usage = AiUsage::default();
    for critic in Critic::ALL {
        let (critique, critic_usage) = run_critic(&state, critic, &ctx).await;
        critiques.insert(critic.key(), critique);
        usage = usage.merge(critic_usage);
    }
    let overall_score =
        critics::overall_score(&critiques.values().cloned().collect::<Vec<_>>());

    let settled = meter.settle(&state, &usage).await?;
    Ok(Json(ChargedResponse {
        data: CriticsResult {
            critiques,
            overall_score,
        },
        tokens_used: settled.tokens_used,
        remaining_tokens: settled.remaining_tokens,
        fallback: usage.fallback,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn run_idea_analysis(
    state: &AppState,
    idea: &str,
    intent: Option<&str>,
) -> (IdeaAnalysis, AiUsage) {
    complete_or_fallback(
        &state.llm,
        &prompts::idea_analysis(idea, intent),
        parse_object::<IdeaAnalysis>,
        || heuristics::idea_analysis(idea),
    )
    .await
}

async fn run_critic(state: &AppState, critic: Critic, ctx: &StoryContext) -> (Critique, AiUsage) {
    let project = ctx.project_view();
    let scenes = ctx.scene_views();
    let objects = ctx.object_views();
    let characters = ctx.character_views();

    let prompt = match critic {
        Critic::ProfessorSyntax => prompts::structure_critique(&project, &scenes),
        Critic::CharacterWhisperer => prompts::character_critique(&project, &scenes, &characters),
        Critic::ObjectFlowAnalyzer => prompts::object_flow_critique(&project, &scenes, &objects),
    };

    complete_or_fallback(
        &state.llm,
        &prompt,
        |text| Ok::<_, std::convert::Infallible>(critics::parse_critique(critic, text)),
        || match critic {
            Critic::ProfessorSyntax => critics::fallback_structure(scenes.len()),
            Critic::CharacterWhisperer => critics::fallback_characters(&characters),
            Critic::ObjectFlowAnalyzer => critics::fallback_object_flow(&objects),
        },
    )
    .await
}

/// Create the opening scene suggested for a new project and link the
/// objects it names.
async fn create_first_scene(
    tx: &mut Transaction<'_, Postgres>,
    project_id: DbId,
    suggestion: &FirstSceneSuggestion,
    objects: &[StoryObject],
) -> AppResult<Option<Scene>> {
    let title = suggestion.title.trim();
    let description = suggestion.description.trim();
    if title.is_empty() || description.is_empty() {
        return Ok(None);
    }

    let scene_type = if validate_one_of("scene_type", &suggestion.scene_type, VALID_SCENE_TYPES)
        .is_ok()
    {
        suggestion.scene_type.clone()
    } else {
        scene_types::INCITING.to_string()
    };

    let create = CreateScene {
        title: title.to_string(),
        description: Some(description.to_string()),
        scene_type: Some(scene_type),
        order_index: Some(0),
        location: Some(suggestion.location.clone()).filter(|l| !l.trim().is_empty()),
        conflict: Some(suggestion.conflict.clone()).filter(|c| !c.trim().is_empty()),
        hook: Some(suggestion.hook.clone()).filter(|h| !h.trim().is_empty()),
        ..Default::default()
    };
    let scene = SceneRepo::create(&mut **tx, project_id, &create).await?;

    for name in &suggestion.objects {
        let wanted = name.trim().to_lowercase();
        if let Some(object) = objects.iter().find(|o| o.name.to_lowercase() == wanted) {
            let level = ObjectKind::parse(&object.object_type)
                .map_or(significance::SUPPORTING, ObjectKind::default_significance);
            SceneObjectRepo::link_if_missing(&mut **tx, scene.id, object.id, level).await?;
        }
    }

    Ok(Some(scene))
}
