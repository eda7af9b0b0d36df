//! Read side of the `token_usage_logs` table. Rows are written by
//! [`TokenLedgerRepo::charge`](super::TokenLedgerRepo::charge).

use sqlx::PgPool;
use storyforge_core::tokens::UsageRecord;
use storyforge_core::types::{DbId, Timestamp};

use crate::models::token_usage::TokenUsageLog;

const COLUMNS: &str = "id, user_id, project_id, scene_id, operation_type, input_tokens, \
                        output_tokens, total_cost, multiplier_bp, ai_model_used, \
                        response_time_ms, operation_metadata, billable, created_at";

pub struct TokenUsageRepo;

impl TokenUsageRepo {
    /// Billable charges since `since`, oldest first, in the shape the usage
    /// summarizer takes.
    pub async fn records_since(
        pool: &PgPool,
        user_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<UsageRecord>, sqlx::Error> {
        let rows: Vec<(String, i64, Timestamp)> = sqlx::query_as(
            "SELECT operation_type, total_cost, created_at FROM token_usage_logs
             WHERE user_id = $1 AND created_at >= $2 AND billable
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(operation_type, total_cost, created_at)| UsageRecord {
                operation_type,
                total_cost,
                created_at,
            })
            .collect())
    }

    /// Most recent log rows since `since`, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        user_id: DbId,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<TokenUsageLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM token_usage_logs
             WHERE user_id = $1 AND created_at >= $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        );
        sqlx::query_as::<_, TokenUsageLog>(&query)
            .bind(user_id)
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
