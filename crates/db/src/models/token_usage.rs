//! Token usage log model.

use serde::Serialize;
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};

/// A row from the `token_usage_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenUsageLog {
    pub id: DbId,
    pub user_id: DbId,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub operation_type: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_cost: i64,
    pub multiplier_bp: i64,
    pub ai_model_used: Option<String>,
    pub response_time_ms: Option<i32>,
    pub operation_metadata: serde_json::Value,
    pub billable: bool,
    pub created_at: Timestamp,
}

/// A charge against a user's balance, written by the token ledger.
#[derive(Debug, Clone)]
pub struct NewCharge {
    pub user_id: DbId,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub operation_type: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_cost: i64,
    pub multiplier_bp: i64,
    pub ai_model_used: Option<String>,
    pub response_time_ms: Option<i32>,
    pub operation_metadata: serde_json::Value,
}
