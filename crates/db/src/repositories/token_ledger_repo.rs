//! The token ledger: the only code that moves a user's token balance.
//!
//! Charges lock the user row (`SELECT ... FOR UPDATE`) so the balance check
//! and the write observe the same state; concurrent charges for one user
//! serialize on that lock. [`TokenLedgerRepo::charge_in_tx`] joins a
//! caller's transaction so paid-for writes commit only with their charge.

use sqlx::{PgPool, Postgres, Transaction};
use storyforge_core::billing::CREDIT_REASON_PURCHASE;
use storyforge_core::tokens::{check_balance, BalanceCheck};
use storyforge_core::types::DbId;

use crate::models::billing::{CreateTokenPurchase, TokenPurchase};
use crate::models::token_usage::NewCharge;
use crate::models::user::User;
use crate::repositories::{token_purchase_repo, user_repo};

/// Result of [`TokenLedgerRepo::charge`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Charged {
        log_id: DbId,
        tokens_used: i64,
        tokens_limit: i64,
        remaining: i64,
    },
    /// Nothing was written.
    Insufficient(BalanceCheck),
}

/// How credited tokens reach the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditKind {
    /// Raises `tokens_limit`.
    Purchase,
    /// Lowers `tokens_used`, never below zero.
    Bonus,
}

pub struct TokenLedgerRepo;

impl TokenLedgerRepo {
    /// Charge `charge.total_cost` tokens to the user and write the usage log,
    /// all in one transaction.
    ///
    /// Returns `RowNotFound` when the user does not exist.
    pub async fn charge(pool: &PgPool, charge: &NewCharge) -> Result<ChargeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let outcome = Self::charge_in_tx(&mut tx, charge).await?;
        match outcome {
            ChargeOutcome::Charged { .. } => tx.commit().await?,
            ChargeOutcome::Insufficient(_) => tx.rollback().await?,
        }
        Ok(outcome)
    }

    /// Lock the user's balance row for the rest of `tx` and return
    /// `(tokens_limit, tokens_used)`.
    ///
    /// Writes that must only land together with a charge take this lock
    /// first, so they cannot interleave with another charge for the user.
    pub async fn lock_balance(
        tx: &mut Transaction<'_, Postgres>,
        user_id: DbId,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as("SELECT tokens_limit, tokens_used FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await
    }

    /// Charge inside the caller's transaction. On `Insufficient` nothing was
    /// written by this call; the caller decides whether to roll back.
    pub async fn charge_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        charge: &NewCharge,
    ) -> Result<ChargeOutcome, sqlx::Error> {
        let (tokens_limit, tokens_used) = Self::lock_balance(tx, charge.user_id).await?;

        let check = check_balance(tokens_limit, tokens_used, charge.total_cost);
        if !check.allowed {
            tracing::info!(
                user_id = charge.user_id,
                operation = %charge.operation_type,
                required = charge.total_cost,
                remaining = check.remaining,
                "Token charge refused"
            );
            return Ok(ChargeOutcome::Insufficient(check));
        }

        let new_used: i64 = sqlx::query_scalar(
            "UPDATE users SET tokens_used = tokens_used + $2 WHERE id = $1 RETURNING tokens_used",
        )
        .bind(charge.user_id)
        .bind(charge.total_cost)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "UPDATE user_subscriptions
             SET tokens_used_this_period = tokens_used_this_period + $2
             WHERE user_id = $1 AND status IN ('active', 'cancelling')",
        )
        .bind(charge.user_id)
        .bind(charge.total_cost)
        .execute(&mut **tx)
        .await?;

        let log_id: DbId = sqlx::query_scalar(
            "INSERT INTO token_usage_logs
                (user_id, project_id, scene_id, operation_type, input_tokens, output_tokens,
                 total_cost, multiplier_bp, ai_model_used, response_time_ms, operation_metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
        )
        .bind(charge.user_id)
        .bind(charge.project_id)
        .bind(charge.scene_id)
        .bind(&charge.operation_type)
        .bind(charge.input_tokens)
        .bind(charge.output_tokens)
        .bind(charge.total_cost)
        .bind(charge.multiplier_bp)
        .bind(&charge.ai_model_used)
        .bind(charge.response_time_ms)
        .bind(&charge.operation_metadata)
        .fetch_one(&mut **tx)
        .await?;

        tracing::debug!(
            user_id = charge.user_id,
            operation = %charge.operation_type,
            cost = charge.total_cost,
            tokens_used = new_used,
            "Token charge written"
        );

        Ok(ChargeOutcome::Charged {
            log_id,
            tokens_used: new_used,
            tokens_limit,
            remaining: (tokens_limit - new_used).max(0),
        })
    }

    /// Add `amount` tokens to a user's balance. Returns `None` if the user
    /// does not exist.
    pub async fn credit(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        kind: CreditKind,
    ) -> Result<Option<User>, sqlx::Error> {
        let assignment = match kind {
            CreditKind::Purchase => "tokens_limit = tokens_limit + $2",
            CreditKind::Bonus => "tokens_used = GREATEST(tokens_used - $2, 0)",
        };
        let query = format!(
            "UPDATE users SET {assignment} WHERE id = $1 RETURNING {}",
            user_repo::COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(amount)
            .fetch_optional(pool)
            .await?;

        if user.is_some() {
            tracing::info!(user_id, amount, kind = ?kind, "Tokens credited");
        }
        Ok(user)
    }

    /// Record a completed token purchase and raise the user's limit by the
    /// purchased amount in one transaction.
    pub async fn record_purchase(
        pool: &PgPool,
        input: &CreateTokenPurchase,
    ) -> Result<(TokenPurchase, User), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO token_purchases
                (user_id, tokens_purchased, price_paid_cents, payment_method, payment_id,
                 payment_status, purchase_reason, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
             RETURNING {}",
            token_purchase_repo::COLUMNS
        );
        let purchase = sqlx::query_as::<_, TokenPurchase>(&query)
            .bind(input.user_id)
            .bind(input.tokens_purchased)
            .bind(input.price_paid_cents)
            .bind(&input.payment_method)
            .bind(&input.payment_id)
            .bind(&input.payment_status)
            .bind(if input.purchase_reason.is_empty() {
                CREDIT_REASON_PURCHASE
            } else {
                input.purchase_reason.as_str()
            })
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "UPDATE users SET tokens_limit = tokens_limit + $2 WHERE id = $1 RETURNING {}",
            user_repo::COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(input.user_id)
            .bind(input.tokens_purchased)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((purchase, user))
    }
}
