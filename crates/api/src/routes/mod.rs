pub mod admin;
pub mod ai;
pub mod auth;
pub mod billing;
pub mod collaboration;
pub mod health;
pub mod project;
pub mod scene;
pub mod story_object;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                          WebSocket (?token=)
///
/// /auth/register                               register (public)
/// /auth/login                                  login (public)
/// /auth/refresh                                refresh (public)
/// /auth/logout                                 logout
/// /auth/me                                     current user
///
/// /projects                                    list, create
/// /projects/{id}                               get, update, delete
/// /projects/{id}/scenes|objects                per-project scenes and objects
/// /projects/{id}/story/...                     story, generation, export
/// /projects/{id}/analyze-structure|...         AI analysis
/// /projects/{id}/collaborators/...             collaborators
/// /projects/{id}/presence                      who is online
/// /projects/{id}/comments                      comment threads
///
/// /scenes/{id}                                 get, update, delete
/// /scenes/{id}/objects[/{object_id}]           link, unlink
/// /objects/{id}                                get, update, delete
///
/// /ai/analyze-idea|create-project-from-idea    idea intake
/// /ai/estimate|status                          pricing and mode
///
/// /billing/...                                 plans, subscriptions, tokens
/// /collaboration/invitations/{token}/...       accept, decline
/// /comments/{id}[/resolve]                     delete, resolve
/// /admin/users/{id}/tokens                     grant tokens (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws", get(ws::ws_handler))
        // Authentication routes.
        .nest("/auth", auth::router())
        // Projects and everything scoped to one.
        .nest("/projects", project::router())
        .nest("/scenes", scene::router())
        .nest("/objects", story_object::router())
        // Project-independent AI operations.
        .nest("/ai", ai::router())
        // Plans, subscriptions, token purchases and the gateway webhook.
        .nest("/billing", billing::router())
        // Invitations and comments.
        .nest("/collaboration", collaboration::router())
        .nest("/comments", collaboration::comments_router())
        .nest("/admin", admin::router())
}
