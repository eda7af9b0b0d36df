//! Shared response envelope types for API handlers.
//!
//! Lists and composite payloads use a `{ "data": ... }` envelope. Use
//! [`DataResponse`] instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Result of a token-charged AI operation.
///
/// `data` carries the operation payload; the balance fields reflect the
/// ledger after the charge.
#[derive(Debug, Serialize)]
pub struct ChargedResponse<T: Serialize> {
    pub data: T,
    pub tokens_used: i64,
    pub remaining_tokens: i64,
    /// `true` when the local heuristics answered instead of the model.
    pub fallback: bool,
}
