//! Route definitions for the `/objects` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::story_object;
use crate::state::AppState;

/// Routes mounted at `/objects`.
///
/// ```text
/// GET    /{id} -> get_object
/// PUT    /{id} -> update_object
/// DELETE /{id} -> delete_object
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        get(story_object::get_object)
            .put(story_object::update_object)
            .delete(story_object::delete_object),
    )
}
