//! Hourly subscription period rollover.
//!
//! Subscriptions flagged to cancel end and drop the user onto the free
//! plan. Locally simulated subscriptions renew themselves; gateway-backed
//! ones renew when the invoice webhook arrives.

use std::time::Duration;

use sqlx::PgPool;
use storyforge_core::billing::{subscription_status, PlanTier};
use storyforge_db::models::billing::UserSubscription;
use storyforge_db::repositories::{BillingPlanRepo, SubscriptionRepo};
use tokio_util::sync::CancellationToken;

const ROLLOVER_INTERVAL: Duration = Duration::from_secs(3600);

/// Prefix of subscription ids issued by the simulated gateway.
const SIMULATED_ID_PREFIX: &str = "sim_";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RolloverSummary {
    pub cancelled: usize,
    pub renewed: usize,
}

/// Run the rollover loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = ROLLOVER_INTERVAL.as_secs(),
        "Subscription rollover job started"
    );

    let mut interval = tokio::time::interval(ROLLOVER_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Subscription rollover job stopping");
                break;
            }
            _ = interval.tick() => {
                match roll_over(&pool).await {
                    Ok(summary) if summary == RolloverSummary::default() => {
                        tracing::debug!("Subscription rollover: nothing due");
                    }
                    Ok(summary) => tracing::info!(
                        cancelled = summary.cancelled,
                        renewed = summary.renewed,
                        "Subscription rollover complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "Subscription rollover failed"),
                }
            }
        }
    }
}

/// Process every subscription whose period has ended.
pub async fn roll_over(pool: &PgPool) -> Result<RolloverSummary, sqlx::Error> {
    let due = SubscriptionRepo::list_period_ended(pool).await?;
    let mut summary = RolloverSummary::default();
    if due.is_empty() {
        return Ok(summary);
    }

    let free_plan = BillingPlanRepo::find_active_by_name(pool, PlanTier::Free.as_str()).await?;

    for subscription in due {
        if ends_now(&subscription) {
            let Some(free) = &free_plan else {
                tracing::error!("Free plan missing; cannot end subscriptions");
                continue;
            };
            if SubscriptionRepo::cancel_and_downgrade(pool, subscription.id, free)
                .await?
                .is_some()
            {
                summary.cancelled += 1;
            }
        } else if renews_locally(&subscription)
            && SubscriptionRepo::renew_period(pool, subscription.id)
                .await?
                .is_some()
        {
            summary.renewed += 1;
        }
    }
    Ok(summary)
}

fn ends_now(subscription: &UserSubscription) -> bool {
    subscription.cancel_at_period_end || subscription.status == subscription_status::CANCELLING
}

fn renews_locally(subscription: &UserSubscription) -> bool {
    subscription.status == subscription_status::ACTIVE
        && subscription
            .external_subscription_id
            .as_deref()
            .is_none_or(|id| id.starts_with(SIMULATED_ID_PREFIX))
}
