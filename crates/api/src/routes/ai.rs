//! Route definitions for the `/ai` resource (operations not tied to an
//! existing project).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::ai;
use crate::state::AppState;

/// Routes mounted at `/ai`.
///
/// ```text
/// POST /analyze-idea              -> analyze_idea
/// POST /create-project-from-idea  -> create_project_from_idea
/// POST /estimate                  -> estimate_cost
/// GET  /status                    -> ai_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze-idea", post(ai::analyze_idea))
        .route(
            "/create-project-from-idea",
            post(ai::create_project_from_idea),
        )
        .route("/estimate", post(ai::estimate_cost))
        .route("/status", get(ai::ai_status))
}
