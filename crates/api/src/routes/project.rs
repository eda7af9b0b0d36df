//! Route definitions for the `/projects` resource and everything scoped to a
//! single project.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{ai, collaboration, comment, project, scene, story, story_object};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                     -> list_projects
/// POST   /                                     -> create_project
/// GET    /{id}                                 -> get_project
/// PUT    /{id}                                 -> update_project
/// DELETE /{id}                                 -> delete_project
/// GET    /{id}/activity                        -> list_activity
///
/// GET    /{id}/scenes                          -> list_scenes
/// POST   /{id}/scenes                          -> create_scene
/// POST   /{id}/scenes/reorder                  -> reorder_scenes
/// GET    /{id}/objects                         -> list_objects
/// POST   /{id}/objects                         -> create_object
///
/// GET    /{id}/story                           -> get_story
/// PUT    /{id}/story                           -> update_story
/// POST   /{id}/story/generate                  -> generate_story
/// POST   /{id}/story/chapters/{index}/regenerate -> regenerate_chapter
/// GET    /{id}/story/export                    -> export_story
///
/// POST   /{id}/analyze-structure               -> analyze_structure
/// POST   /{id}/suggest-scenes                  -> suggest_scenes
/// POST   /{id}/summarize                       -> summarize
/// POST   /{id}/critics                         -> run_critics
///
/// GET    /{id}/collaborators                   -> list_collaborators
/// POST   /{id}/collaborators                   -> invite_collaborator
/// PUT    /{id}/collaborators/{user_id}         -> update_collaborator
/// DELETE /{id}/collaborators/{user_id}         -> remove_collaborator
/// GET    /{id}/presence                        -> get_presence
/// GET    /{id}/collaboration/analytics         -> collaboration_analytics
/// GET    /{id}/comments                        -> list_comments
/// POST   /{id}/comments                        -> create_comment
/// ```
pub fn router() -> Router<AppState> {
    let story_routes = Router::new()
        .route("/", get(story::get_story).put(story::update_story))
        .route("/generate", post(story::generate_story))
        .route(
            "/chapters/{index}/regenerate",
            post(story::regenerate_chapter),
        )
        .route("/export", get(story::export_story));

    Router::new()
        .route("/", get(project::list_projects).post(project::create_project))
        .route(
            "/{id}",
            get(project::get_project)
                .put(project::update_project)
                .delete(project::delete_project),
        )
        .route("/{id}/activity", get(project::list_activity))
        // Scenes and objects.
        .route(
            "/{id}/scenes",
            get(scene::list_scenes).post(scene::create_scene),
        )
        .route("/{id}/scenes/reorder", post(scene::reorder_scenes))
        .route(
            "/{id}/objects",
            get(story_object::list_objects).post(story_object::create_object),
        )
        // Story.
        .nest("/{id}/story", story_routes)
        // AI analysis.
        .route("/{id}/analyze-structure", post(ai::analyze_structure))
        .route("/{id}/suggest-scenes", post(ai::suggest_scenes))
        .route("/{id}/summarize", post(ai::summarize))
        .route("/{id}/critics", post(ai::run_critics))
        // Collaboration.
        .route(
            "/{id}/collaborators",
            get(collaboration::list_collaborators).post(collaboration::invite_collaborator),
        )
        .route(
            "/{id}/collaborators/{user_id}",
            put(collaboration::update_collaborator).delete(collaboration::remove_collaborator),
        )
        .route("/{id}/presence", get(collaboration::get_presence))
        .route(
            "/{id}/collaboration/analytics",
            get(collaboration::collaboration_analytics),
        )
        .route(
            "/{id}/comments",
            get(comment::list_comments).post(comment::create_comment),
        )
}
