//! Billing plan, subscription and token purchase models.

use serde::Serialize;
use sqlx::FromRow;
use storyforge_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// BillingPlan
// ---------------------------------------------------------------------------

/// A row from the `billing_plans` table. `-1` limits mean unlimited.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BillingPlan {
    pub id: DbId,
    pub name: String,
    pub display_name: String,
    pub monthly_token_limit: i64,
    pub max_projects: i32,
    pub max_collaborators: i32,
    pub monthly_price_cents: i64,
    pub token_overage_price_per_1k_cents: i64,
    pub features: serde_json::Value,
    pub is_active: bool,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// UserSubscription
// ---------------------------------------------------------------------------

/// A row from the `user_subscriptions` table. One per user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSubscription {
    pub id: DbId,
    pub user_id: DbId,
    pub plan_id: DbId,
    pub status: String,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub cancel_at_period_end: bool,
    pub tokens_used_this_period: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for starting (or restarting) a subscription.
pub struct CreateSubscription {
    pub user_id: DbId,
    pub plan_id: DbId,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
}

// ---------------------------------------------------------------------------
// TokenPurchase
// ---------------------------------------------------------------------------

/// A row from the `token_purchases` table. Doubles as an invoice.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenPurchase {
    pub id: DbId,
    pub user_id: DbId,
    pub tokens_purchased: i64,
    pub price_paid_cents: i64,
    pub payment_method: String,
    pub payment_id: Option<String>,
    pub payment_status: String,
    pub purchase_reason: String,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

pub struct CreateTokenPurchase {
    pub user_id: DbId,
    pub tokens_purchased: i64,
    pub price_paid_cents: i64,
    pub payment_method: String,
    pub payment_id: Option<String>,
    pub payment_status: String,
    pub purchase_reason: String,
}
