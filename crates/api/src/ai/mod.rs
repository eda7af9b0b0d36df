//! Metered AI calls.
//!
//! Every token-charged operation runs the same sequence:
//!
//! 1. [`Meter::quote`] prices the operation with `estimate` and rejects it
//!    with 402 when the caller's balance cannot cover the quote.
//! 2. [`complete_or_fallback`] asks the model and, on any failure or
//!    unparseable reply, substitutes the local heuristic answer.
//! 3. [`Meter::settle`] charges the quoted cost through the token ledger
//!    (402 again if a concurrent charge drained the balance) and publishes
//!    `tokens.charged`. Operations that persist their output open
//!    [`Meter::begin`] first and finish with [`Meter::settle_in_tx`], so the
//!    output commits only together with its charge.

pub mod context;
pub mod extraction;

use std::fmt::Display;
use std::time::Instant;

use serde_json::json;
use sqlx::{Postgres, Transaction};
use storyforge_core::error::CoreError;
use storyforge_core::prompts::Prompt;
use storyforge_core::tokens::{
    check_balance, estimate, estimate_input_tokens, operation_cost, CostEstimate, OperationType,
    MULTIPLIER_ONE_BP,
};
use storyforge_core::types::DbId;
use storyforge_db::models::token_usage::NewCharge;
use storyforge_db::repositories::{ChargeOutcome, TokenLedgerRepo, UserRepo};
use storyforge_events::{kinds, StoryEvent};
use storyforge_llm::LlmClient;

use crate::error::AppResult;
use crate::state::AppState;

/// Model name recorded when the heuristics answered.
pub const HEURISTIC_MODEL: &str = "heuristic";

/// Token accounting for one completion (or a merged group of them).
#[derive(Debug, Clone, Default)]
pub struct AiUsage {
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub elapsed_ms: u128,
    /// At least one answer came from the heuristics.
    pub fallback: bool,
}

impl AiUsage {
    /// Combine the usage of several completions run for one operation.
    pub fn merge(mut self, other: AiUsage) -> AiUsage {
        if self.model.is_empty() || self.model == HEURISTIC_MODEL {
            self.model = other.model;
        }
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.elapsed_ms += other.elapsed_ms;
        self.fallback |= other.fallback;
        self
    }
}

/// Ask the model for `prompt` and parse the reply; fall back to `fallback`
/// when the call fails or the reply does not parse. Never fails.
pub async fn complete_or_fallback<T, E, P, F>(
    llm: &LlmClient,
    prompt: &Prompt,
    parse: P,
    fallback: F,
) -> (T, AiUsage)
where
    E: Display,
    P: FnOnce(&str) -> Result<T, E>,
    F: FnOnce() -> T,
{
    let started = Instant::now();
    let heuristic_usage = |started: Instant| AiUsage {
        model: HEURISTIC_MODEL.to_string(),
        input_tokens: estimate_input_tokens(&format!("{}\n{}", prompt.system, prompt.user)),
        output_tokens: 0,
        elapsed_ms: started.elapsed().as_millis(),
        fallback: true,
    };

    let completion = match llm.complete(prompt).await {
        Ok(completion) => completion,
        Err(e) => {
            tracing::warn!(error = %e, "LLM call failed, using heuristic fallback");
            return (fallback(), heuristic_usage(started));
        }
    };

    match parse(&completion.text) {
        Ok(value) => (
            value,
            AiUsage {
                model: completion.model,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                elapsed_ms: started.elapsed().as_millis(),
                fallback: false,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, model = %completion.model, "Unparseable LLM reply, using heuristic fallback");
            let mut usage = heuristic_usage(started);
            usage.input_tokens = completion.input_tokens;
            usage.output_tokens = completion.output_tokens;
            (fallback(), usage)
        }
    }
}

/// Balance after a settled charge.
#[derive(Debug, Clone, Copy)]
pub struct Settled {
    pub tokens_used: i64,
    pub remaining_tokens: i64,
}

/// A priced operation awaiting its charge.
#[derive(Debug, Clone)]
pub struct Meter {
    pub user_id: DbId,
    pub project_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub quote: CostEstimate,
}

impl Meter {
    /// Price `op` for `input_text` and require the balance to cover it.
    pub async fn quote(
        state: &AppState,
        user_id: DbId,
        op: OperationType,
        input_text: &str,
    ) -> AppResult<Self> {
        let quote = estimate(op, input_text, None);

        let user = UserRepo::find_by_id(&state.pool, user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "User",
                id: user_id,
            })?;

        check_balance(user.tokens_limit, user.tokens_used, quote.estimated_total_cost)
            .into_result()?;

        Ok(Self {
            user_id,
            project_id: None,
            scene_id: None,
            quote,
        })
    }

    pub fn in_project(mut self, project_id: DbId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn for_scene(mut self, scene_id: DbId) -> Self {
        self.scene_id = Some(scene_id);
        self
    }

    pub fn cost(&self) -> i64 {
        self.quote.estimated_total_cost
    }

    /// Open the transaction for writes this operation pays for.
    ///
    /// The caller's balance row is locked first, so no other charge for the
    /// user can land between these writes and [`Meter::settle_in_tx`].
    pub async fn begin(&self, state: &AppState) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = state.pool.begin().await?;
        TokenLedgerRepo::lock_balance(&mut tx, self.user_id).await?;
        Ok(tx)
    }

    /// Charge the quoted cost and record what the call actually consumed.
    pub async fn settle(self, state: &AppState, usage: &AiUsage) -> AppResult<Settled> {
        let tx = state.pool.begin().await?;
        self.settle_in_tx(state, tx, usage).await
    }

    /// Charge inside `tx` and commit it. A refused charge rolls back every
    /// write made in `tx` and returns 402.
    pub async fn settle_in_tx(
        self,
        state: &AppState,
        mut tx: Transaction<'static, Postgres>,
        usage: &AiUsage,
    ) -> AppResult<Settled> {
        let op = self.quote.operation_type;
        let cost = self.cost();
        let charge = self.new_charge(usage);

        match TokenLedgerRepo::charge_in_tx(&mut tx, &charge).await? {
            ChargeOutcome::Charged {
                log_id, remaining, ..
            } => {
                tx.commit().await?;
                tracing::info!(
                    user_id = self.user_id,
                    operation = op.as_str(),
                    cost,
                    remaining,
                    fallback = usage.fallback,
                    "Tokens charged"
                );

                let mut event = StoryEvent::new(kinds::TOKENS_CHARGED)
                    .with_source("token_usage_log", log_id)
                    .with_actor(self.user_id)
                    .with_payload(json!({
                        "operation_type": op.as_str(),
                        "cost": cost,
                        "remaining": remaining,
                    }));
                if let Some(project_id) = self.project_id {
                    event = event.in_project(project_id);
                }
                state.event_bus.publish(event);

                Ok(Settled {
                    tokens_used: cost,
                    remaining_tokens: remaining,
                })
            }
            ChargeOutcome::Insufficient(check) => {
                tx.rollback().await?;
                tracing::info!(
                    user_id = self.user_id,
                    operation = op.as_str(),
                    cost,
                    remaining = check.remaining,
                    "Charge refused after completion"
                );
                Err(CoreError::InsufficientTokens {
                    required: check.required,
                    remaining: check.remaining,
                    deficit: check.deficit.unwrap_or(check.required - check.remaining),
                }
                .into())
            }
        }
    }

    fn new_charge(&self, usage: &AiUsage) -> NewCharge {
        let op = self.quote.operation_type;
        let cost = self.cost();
        let actual_cost =
            operation_cost(op, usage.input_tokens, usage.output_tokens, MULTIPLIER_ONE_BP);

        NewCharge {
            user_id: self.user_id,
            project_id: self.project_id,
            scene_id: self.scene_id,
            operation_type: op.as_str().to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_cost: cost,
            multiplier_bp: MULTIPLIER_ONE_BP,
            ai_model_used: (!usage.model.is_empty()).then(|| usage.model.clone()),
            response_time_ms: i32::try_from(usage.elapsed_ms).ok(),
            operation_metadata: json!({
                "estimated_cost": cost,
                "actual_cost": actual_cost,
                "fallback": usage.fallback,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_reply_parses_without_fallback() {
        let llm = LlmClient::simulated();
        let prompt = storyforge_core::prompts::idea_analysis(
            "An old woman hides a coded letter from her granddaughter",
            None,
        );
        let (analysis, usage) = complete_or_fallback(
            &llm,
            &prompt,
            storyforge_core::ai_response::parse_object::<storyforge_core::ai_response::IdeaAnalysis>,
            || storyforge_core::heuristics::idea_analysis("x"),
        )
        .await;

        assert!(!usage.fallback);
        assert_eq!(analysis.story_assessment.genre, "mystery");
    }

    #[tokio::test]
    async fn parse_failure_uses_fallback() {
        let llm = LlmClient::simulated();
        let prompt = Prompt {
            system: "plain".into(),
            user: "say hello".into(),
            max_tokens: 10,
        };
        let (value, usage) = complete_or_fallback(
            &llm,
            &prompt,
            |_| Err::<i32, _>("not a number"),
            || 7,
        )
        .await;

        assert_eq!(value, 7);
        assert!(usage.fallback);
        assert_eq!(usage.model, HEURISTIC_MODEL);
    }

    #[test]
    fn merge_keeps_first_real_model() {
        let heuristic = AiUsage {
            model: HEURISTIC_MODEL.into(),
            input_tokens: 5,
            fallback: true,
            ..Default::default()
        };
        let real = AiUsage {
            model: "claude".into(),
            input_tokens: 10,
            output_tokens: 20,
            ..Default::default()
        };
        let merged = heuristic.merge(real);
        assert_eq!(merged.model, "claude");
        assert_eq!(merged.input_tokens, 15);
        assert_eq!(merged.output_tokens, 20);
        assert!(merged.fallback);
    }
}
