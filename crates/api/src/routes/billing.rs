//! Route definitions for the `/billing` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::billing;
use crate::state::AppState;

/// Routes mounted at `/billing`.
///
/// ```text
/// GET  /plans           -> list_plans (public)
/// GET  /balance         -> get_balance
/// GET  /subscription    -> get_subscription
/// POST /subscribe       -> subscribe
/// POST /upgrade         -> change_plan
/// POST /cancel          -> cancel_subscription
/// POST /buy-tokens      -> buy_tokens
/// GET  /usage           -> usage_analytics
/// GET  /history         -> billing_history
/// GET  /invoices/{id}   -> get_invoice
/// POST /webhook         -> webhook (public, signed)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(billing::list_plans))
        .route("/balance", get(billing::get_balance))
        .route("/subscription", get(billing::get_subscription))
        .route("/subscribe", post(billing::subscribe))
        .route("/upgrade", post(billing::change_plan))
        .route("/cancel", post(billing::cancel_subscription))
        .route("/buy-tokens", post(billing::buy_tokens))
        .route("/usage", get(billing::usage_analytics))
        .route("/history", get(billing::billing_history))
        .route("/invoices/{id}", get(billing::get_invoice))
        .route("/webhook", post(billing::webhook))
}
