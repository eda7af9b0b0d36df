//! Route definitions for `/collaboration` (invitation responses) and
//! `/comments`.

use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::{collaboration, comment};
use crate::state::AppState;

/// Routes mounted at `/collaboration`.
///
/// ```text
/// POST /invitations/{token}/accept   -> accept_invitation
/// POST /invitations/{token}/decline  -> decline_invitation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/invitations/{token}/accept",
            post(collaboration::accept_invitation),
        )
        .route(
            "/invitations/{token}/decline",
            post(collaboration::decline_invitation),
        )
}

/// Routes mounted at `/comments`.
///
/// ```text
/// POST   /{id}/resolve -> resolve_comment
/// DELETE /{id}         -> delete_comment
/// ```
pub fn comments_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/resolve", post(comment::resolve_comment))
        .route("/{id}", delete(comment::delete_comment))
}
