//! Plan tiers, subscription statuses, proration and token-pack pricing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a billing period in days.
pub const BILLING_PERIOD_DAYS: i64 = 30;

/// Price of 1000 purchased tokens, in cents.
pub const TOKEN_PACK_PRICE_PER_1K_CENTS: i64 = 299;

/// Largest single token purchase.
pub const MAX_TOKEN_PURCHASE: i64 = 1_000_000;

/// Reason recorded for tokens bought through the gateway.
pub const CREDIT_REASON_PURCHASE: &str = "purchase";

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Subscription tiers. Names match the seeded `billing_plans.name` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Monthly token allowance granted by the tier.
    pub fn monthly_token_limit(self) -> i64 {
        match self {
            Self::Free => 1_000,
            Self::Pro => 10_000,
            Self::Enterprise => 50_000,
        }
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(CoreError::Validation(format!("Unknown plan '{other}'"))),
        }
    }
}

/// Subscription lifecycle states stored in `user_subscriptions.status`.
pub mod subscription_status {
    pub const ACTIVE: &str = "active";
    /// Cancelled by the user; stays usable until the period ends.
    pub const CANCELLING: &str = "cancelling";
    pub const CANCELLED: &str = "cancelled";
    pub const PAST_DUE: &str = "past_due";
}

/// Token purchase states stored in `token_purchases.status`.
pub mod purchase_status {
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

/// Plan quota value meaning "no limit" (`max_projects`, `max_collaborators`).
pub const UNLIMITED: i32 = -1;

/// Whether one more item fits under a plan quota. Negative quotas are unlimited.
pub fn has_capacity(current: i64, max: i32) -> bool {
    max < 0 || current < i64::from(max)
}

// ---------------------------------------------------------------------------
// Plan changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanChange {
    Upgrade,
    Downgrade,
    Same,
}

/// Classify a plan change by monthly price.
pub fn classify_plan_change(current_price_cents: i64, new_price_cents: i64) -> PlanChange {
    match new_price_cents.cmp(&current_price_cents) {
        std::cmp::Ordering::Greater => PlanChange::Upgrade,
        std::cmp::Ordering::Less => PlanChange::Downgrade,
        std::cmp::Ordering::Equal => PlanChange::Same,
    }
}

/// Result of prorating a mid-period plan change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proration {
    pub days_remaining: i64,
    pub credit_cents: i64,
    pub charge_cents: i64,
    pub amount_due_cents: i64,
}

/// Prorate a plan change over the remaining days of a 30-day period.
///
/// The unused part of the current plan is credited and the new plan is
/// charged for the same days. The amount due never goes negative.
pub fn calculate_proration(
    current_price_cents: i64,
    new_price_cents: i64,
    days_remaining: i64,
) -> Proration {
    let days = days_remaining.clamp(0, BILLING_PERIOD_DAYS);
    let credit_cents = current_price_cents * days / BILLING_PERIOD_DAYS;
    let charge_cents = new_price_cents * days / BILLING_PERIOD_DAYS;

    Proration {
        days_remaining: days,
        credit_cents,
        charge_cents,
        amount_due_cents: (charge_cents - credit_cents).max(0),
    }
}

// ---------------------------------------------------------------------------
// Token packs
// ---------------------------------------------------------------------------

/// Validate a token purchase amount and return its price in cents.
pub fn token_pack_price_cents(amount: i64) -> Result<i64, CoreError> {
    if amount <= 0 {
        return Err(CoreError::Validation(
            "Token amount must be positive".to_string(),
        ));
    }
    if amount > MAX_TOKEN_PURCHASE {
        return Err(CoreError::Validation(format!(
            "Token amount must be at most {MAX_TOKEN_PURCHASE}"
        )));
    }
    Ok(amount * TOKEN_PACK_PRICE_PER_1K_CENTS / 1000)
}
