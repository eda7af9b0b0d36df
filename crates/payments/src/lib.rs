//! Payment gateway integration.
//!
//! [`PaymentGateway`] is what billing handlers talk to. [`StripeGateway`]
//! calls the Stripe REST API; [`SimulatedGateway`] answers locally with
//! deterministic ids so billing flows work without credentials.

pub mod config;
pub mod error;
pub mod gateway;
pub mod signature;
pub mod simulation;
pub mod stripe;
pub mod webhook;

use std::sync::Arc;

pub use config::PaymentConfig;
pub use error::PaymentError;
pub use gateway::{
    CancellationReceipt, PaymentGateway, PaymentReceipt, PlanPrice, SubscriptionReceipt,
    SubscriptionRequest, TokenChargeRequest,
};
pub use simulation::SimulatedGateway;
pub use stripe::StripeGateway;
pub use webhook::WebhookEvent;

/// Build the gateway selected by `config`.
pub fn gateway_from_config(config: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    match (&config.secret_key, config.simulation_mode) {
        (Some(secret), false) => {
            tracing::info!(api_base = %config.api_base, "Payments: Stripe gateway");
            Arc::new(StripeGateway::new(
                config.api_base.clone(),
                secret.clone(),
                config.publishable_key.clone().unwrap_or_default(),
                config.webhook_secret.clone(),
            ))
        }
        _ => {
            tracing::info!("Payments: simulation mode");
            Arc::new(SimulatedGateway)
        }
    }
}
