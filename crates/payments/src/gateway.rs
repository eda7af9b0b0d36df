use async_trait::async_trait;
use serde::Serialize;
use storyforge_core::types::DbId;

use crate::error::PaymentError;
use crate::webhook::WebhookEvent;

/// What the gateway needs to know about a plan.
#[derive(Debug, Clone)]
pub struct PlanPrice {
    pub name: String,
    pub display_name: String,
    pub monthly_price_cents: i64,
    pub monthly_token_limit: i64,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    pub user_id: DbId,
    pub email: String,
    pub username: String,
    pub plan: PlanPrice,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionReceipt {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    /// Secret the frontend uses to confirm the first invoice, if needed.
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationReceipt {
    pub subscription_id: String,
    pub status: String,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone)]
pub struct TokenChargeRequest {
    pub user_id: DbId,
    pub email: String,
    pub tokens: i64,
    pub price_cents: i64,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub status: String,
}

impl PaymentReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// A payment backend.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `"stripe"` or `"simulation"`. Stored as the purchase's payment method.
    fn name(&self) -> &'static str;

    fn publishable_key(&self) -> &str;

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionReceipt, PaymentError>;

    /// Move an existing subscription onto `plan` with proration.
    async fn change_plan(
        &self,
        subscription_id: &str,
        plan: &PlanPrice,
    ) -> Result<SubscriptionReceipt, PaymentError>;

    /// Cancel now, or at the end of the current period.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediate: bool,
    ) -> Result<CancellationReceipt, PaymentError>;

    /// One-off charge for a token pack.
    async fn charge_tokens(
        &self,
        request: &TokenChargeRequest,
    ) -> Result<PaymentReceipt, PaymentError>;

    /// Authenticate and decode a webhook delivery.
    fn parse_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError>;
}
