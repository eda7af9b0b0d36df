use async_trait::async_trait;

use crate::config::SIMULATION_PUBLISHABLE_KEY;
use crate::error::PaymentError;
use crate::gateway::{
    CancellationReceipt, PaymentGateway, PaymentReceipt, PlanPrice, SubscriptionReceipt,
    SubscriptionRequest, TokenChargeRequest,
};
use crate::webhook::WebhookEvent;

/// Local stand-in for a real gateway. Every call succeeds with ids derived
/// from its inputs; subscription ids carry the `sim_` prefix the rollover
/// job uses to renew simulated periods.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedGateway;

pub const SIMULATED_ID_PREFIX: &str = "sim_";

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn publishable_key(&self) -> &str {
        SIMULATION_PUBLISHABLE_KEY
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionReceipt, PaymentError> {
        Ok(SubscriptionReceipt {
            subscription_id: format!("sim_sub_{}_{}", request.user_id, request.plan.name),
            customer_id: Some(format!("sim_cust_{}", request.user_id)),
            client_secret: None,
            status: "active".into(),
        })
    }

    async fn change_plan(
        &self,
        subscription_id: &str,
        _plan: &PlanPrice,
    ) -> Result<SubscriptionReceipt, PaymentError> {
        Ok(SubscriptionReceipt {
            subscription_id: subscription_id.to_string(),
            customer_id: None,
            client_secret: None,
            status: "active".into(),
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediate: bool,
    ) -> Result<CancellationReceipt, PaymentError> {
        Ok(CancellationReceipt {
            subscription_id: subscription_id.to_string(),
            status: if immediate { "canceled" } else { "active" }.into(),
            cancel_at_period_end: !immediate,
        })
    }

    async fn charge_tokens(
        &self,
        request: &TokenChargeRequest,
    ) -> Result<PaymentReceipt, PaymentError> {
        Ok(PaymentReceipt {
            payment_id: format!("sim_pi_{}_{}", request.user_id, request.tokens),
            status: "succeeded".into(),
        })
    }

    fn parse_webhook(
        &self,
        payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError> {
        WebhookEvent::parse(payload)
    }
}
