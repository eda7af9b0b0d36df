//! Route definitions for the `/scenes` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::scene;
use crate::state::AppState;

/// Routes mounted at `/scenes`.
///
/// ```text
/// GET    /{id}                       -> get_scene
/// PUT    /{id}                       -> update_scene
/// DELETE /{id}                       -> delete_scene
/// POST   /{id}/objects               -> link_object
/// DELETE /{id}/objects/{object_id}   -> unlink_object
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(scene::get_scene)
                .put(scene::update_scene)
                .delete(scene::delete_scene),
        )
        .route("/{id}/objects", post(scene::link_object))
        .route("/{id}/objects/{object_id}", delete(scene::unlink_object))
}
