//! Administrative operations.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storyforge_core::billing::MAX_TOKEN_PURCHASE;
use storyforge_core::error::CoreError;
use storyforge_core::types::DbId;
use storyforge_db::models::user::UserResponse;
use storyforge_db::repositories::{CreditKind, TokenLedgerRepo};
use storyforge_events::{kinds, StoryEvent};

use crate::error::AppResult;
use crate::middleware::auth::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    /// Forgives used tokens.
    #[default]
    Bonus,
    /// Raises the limit, as if bought.
    Purchase,
}

#[derive(Debug, Deserialize)]
pub struct GrantTokensRequest {
    pub amount: i64,
    #[serde(default)]
    pub kind: GrantKind,
    pub reason: Option<String>,
}

/// POST /api/v1/admin/users/{id}/tokens
pub async fn grant_tokens(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<DbId>,
    Json(input): Json<GrantTokensRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    if input.amount <= 0 || input.amount > MAX_TOKEN_PURCHASE {
        return Err(CoreError::Validation(format!(
            "amount must be between 1 and {MAX_TOKEN_PURCHASE}"
        ))
        .into());
    }

    let credit_kind = match input.kind {
        GrantKind::Bonus => CreditKind::Bonus,
        GrantKind::Purchase => CreditKind::Purchase,
    };
    let user = TokenLedgerRepo::credit(&state.pool, user_id, input.amount, credit_kind)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user_id,
        })?;

    tracing::info!(
        admin_id = admin.user_id,
        user_id,
        amount = input.amount,
        kind = ?input.kind,
        "Admin granted tokens"
    );
    state.event_bus.publish(
        StoryEvent::new(kinds::TOKENS_CREDITED)
            .with_source("user", user_id)
            .with_actor(admin.user_id)
            .with_payload(json!({
                "amount": input.amount,
                "kind": input.kind,
                "reason": input.reason,
                "remaining_tokens": user.tokens_remaining(),
            })),
    );

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}
