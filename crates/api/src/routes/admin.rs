//! Route definitions for the `/admin` resource. Every handler requires the
//! `admin` role.

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST /users/{id}/tokens -> grant_tokens
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/users/{id}/tokens", post(admin::grant_tokens))
}
