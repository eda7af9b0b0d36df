//! Repository for the `user_subscriptions` table.
//!
//! Every method that changes a user's plan also rewrites the plan and token
//! limit on the `users` row inside the same transaction.

use sqlx::{PgPool, Postgres, Transaction};
use storyforge_core::billing::{subscription_status, BILLING_PERIOD_DAYS};
use storyforge_core::types::DbId;

use crate::models::billing::{BillingPlan, CreateSubscription, UserSubscription};

const COLUMNS: &str = "id, user_id, plan_id, status, external_subscription_id, \
                        external_customer_id, current_period_start, current_period_end, \
                        cancel_at_period_end, tokens_used_this_period, created_at, updated_at";

pub struct SubscriptionRepo;

impl SubscriptionRepo {
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_subscriptions WHERE user_id = $1");
        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_subscriptions WHERE external_subscription_id = $1"
        );
        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Start a subscription (replacing a cancelled one), move the user onto
    /// `plan` and reset their usage for the new period.
    pub async fn activate(
        pool: &PgPool,
        input: &CreateSubscription,
        plan: &BillingPlan,
    ) -> Result<UserSubscription, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO user_subscriptions
                (user_id, plan_id, status, external_subscription_id, external_customer_id,
                 current_period_start, current_period_end)
             VALUES ($1, $2, '{active}', $3, $4, $5, $6)
             ON CONFLICT ON CONSTRAINT uq_user_subscriptions_user DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                external_subscription_id = EXCLUDED.external_subscription_id,
                external_customer_id = EXCLUDED.external_customer_id,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = false,
                tokens_used_this_period = 0
             RETURNING {COLUMNS}",
            active = subscription_status::ACTIVE,
        );
        let subscription = sqlx::query_as::<_, UserSubscription>(&query)
            .bind(input.user_id)
            .bind(input.plan_id)
            .bind(&input.external_subscription_id)
            .bind(&input.external_customer_id)
            .bind(input.period_start)
            .bind(input.period_end)
            .fetch_one(&mut *tx)
            .await?;

        apply_plan(&mut tx, input.user_id, plan, true).await?;
        tx.commit().await?;
        Ok(subscription)
    }

    /// Switch an existing subscription to `plan`. Usage is kept; only the
    /// limit changes.
    pub async fn change_plan(
        pool: &PgPool,
        id: DbId,
        plan: &BillingPlan,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE user_subscriptions SET plan_id = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let Some(subscription) = sqlx::query_as::<_, UserSubscription>(&query)
            .bind(id)
            .bind(plan.id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        apply_plan(&mut tx, subscription.user_id, plan, false).await?;
        tx.commit().await?;
        Ok(Some(subscription))
    }

    /// Flag a subscription to end when its current period does.
    pub async fn mark_cancelling(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let query = format!(
            "UPDATE user_subscriptions SET status = '{cancelling}', cancel_at_period_end = true
             WHERE id = $1
             RETURNING {COLUMNS}",
            cancelling = subscription_status::CANCELLING,
        );
        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// End a subscription now and drop the user onto `free_plan`.
    pub async fn cancel_and_downgrade(
        pool: &PgPool,
        id: DbId,
        free_plan: &BillingPlan,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE user_subscriptions SET
                status = '{cancelled}',
                cancel_at_period_end = false,
                current_period_end = LEAST(current_period_end, NOW())
             WHERE id = $1
             RETURNING {COLUMNS}",
            cancelled = subscription_status::CANCELLED,
        );
        let Some(subscription) = sqlx::query_as::<_, UserSubscription>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE users SET plan = $2, tokens_limit = $3 WHERE id = $1")
            .bind(subscription.user_id)
            .bind(&free_plan.name)
            .bind(free_plan.monthly_token_limit)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(subscription))
    }

    /// Begin a fresh billing period. Period and user usage are reset and the
    /// limit returns to the plan allowance plus any purchased tokens still
    /// unspent. Usage counts against the allowance before purchases.
    pub async fn renew_period(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE user_subscriptions SET
                status = '{active}',
                tokens_used_this_period = 0,
                current_period_start = NOW(),
                current_period_end = NOW() + make_interval(days => $2)
             WHERE id = $1
             RETURNING {COLUMNS}",
            active = subscription_status::ACTIVE,
        );
        let Some(subscription) = sqlx::query_as::<_, UserSubscription>(&query)
            .bind(id)
            .bind(BILLING_PERIOD_DAYS as i32)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE users u SET
                tokens_used = 0,
                tokens_limit = p.monthly_token_limit + GREATEST(
                    GREATEST(u.tokens_limit - p.monthly_token_limit, 0)
                        - GREATEST(u.tokens_used - p.monthly_token_limit, 0),
                    0
                ),
                plan = p.name
             FROM billing_plans p
             WHERE u.id = $1 AND p.id = $2",
        )
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(subscription))
    }

    pub async fn mark_past_due(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UserSubscription>, sqlx::Error> {
        let query = format!(
            "UPDATE user_subscriptions SET status = '{past_due}'
             WHERE id = $1 AND status = '{active}'
             RETURNING {COLUMNS}",
            past_due = subscription_status::PAST_DUE,
            active = subscription_status::ACTIVE,
        );
        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active or cancelling subscriptions whose period has ended.
    pub async fn list_period_ended(pool: &PgPool) -> Result<Vec<UserSubscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_subscriptions
             WHERE current_period_end <= NOW() AND status IN ('{active}', '{cancelling}')
             ORDER BY current_period_end",
            active = subscription_status::ACTIVE,
            cancelling = subscription_status::CANCELLING,
        );
        sqlx::query_as::<_, UserSubscription>(&query).fetch_all(pool).await
    }
}

/// Point the user at `plan`, optionally clearing usage.
async fn apply_plan(
    tx: &mut Transaction<'_, Postgres>,
    user_id: DbId,
    plan: &BillingPlan,
    reset_usage: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET
            plan = $2,
            tokens_limit = $3,
            tokens_used = CASE WHEN $4 THEN 0 ELSE tokens_used END
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(&plan.name)
    .bind(plan.monthly_token_limit)
    .bind(reset_usage)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
