//! Stripe REST adapter.
//!
//! Uses form-encoded requests against `/v1/customers`, `/v1/prices`,
//! `/v1/subscriptions` and `/v1/payment_intents`, authenticated with the
//! secret key as a bearer token.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PaymentError;
use crate::gateway::{
    CancellationReceipt, PaymentGateway, PaymentReceipt, PlanPrice, SubscriptionReceipt,
    SubscriptionRequest, TokenChargeRequest,
};
use crate::signature::{verify_signature, DEFAULT_TOLERANCE_SECS};
use crate::webhook::WebhookEvent;

const CURRENCY: &str = "usd";

type Form = Vec<(String, String)>;

pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    publishable_key: String,
    webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    items: Option<SubscriptionItems>,
    #[serde(default)]
    latest_invoice: Option<Invoice>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    data: Vec<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct Invoice {
    #[serde(default)]
    payment_intent: Option<IntentSecret>,
}

#[derive(Debug, Deserialize)]
struct IntentSecret {
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
}

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Form fields for an inline monthly price on `plan`.
fn price_form(plan: &PlanPrice) -> Form {
    vec![
        field("currency", CURRENCY),
        field("unit_amount", plan.monthly_price_cents),
        field("recurring[interval]", "month"),
        field("product_data[name]", &plan.display_name),
        field("metadata[plan_name]", &plan.name),
        field(
            "metadata[monthly_token_limit]",
            plan.monthly_token_limit,
        ),
    ]
}

impl StripeGateway {
    pub fn new(
        api_base: String,
        secret_key: String,
        publishable_key: String,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            publishable_key,
            webhook_secret,
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
    ) -> Result<T, PaymentError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn delete<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self
            .client
            .delete(format!("{}{path}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "Stripe request failed");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn create_price(&self, plan: &PlanPrice) -> Result<String, PaymentError> {
        let price: IdOnly = self.post("/v1/prices", &price_form(plan)).await?;
        Ok(price.id)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn publishable_key(&self) -> &str {
        &self.publishable_key
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionReceipt, PaymentError> {
        let mut customer_form = vec![
            field("email", &request.email),
            field("name", &request.username),
            field("metadata[user_id]", request.user_id),
        ];
        if let Some(pm) = &request.payment_method_id {
            customer_form.push(field("payment_method", pm));
            customer_form.push(field("invoice_settings[default_payment_method]", pm));
        }
        let customer: IdOnly = self.post("/v1/customers", &customer_form).await?;

        let price_id = self.create_price(&request.plan).await?;

        let subscription: StripeSubscription = self
            .post(
                "/v1/subscriptions",
                &vec![
                    field("customer", &customer.id),
                    field("items[0][price]", &price_id),
                    field("payment_behavior", "default_incomplete"),
                    field("expand[0]", "latest_invoice.payment_intent"),
                    field("metadata[user_id]", request.user_id),
                    field("metadata[plan_name]", &request.plan.name),
                ],
            )
            .await?;

        tracing::info!(
            user_id = request.user_id,
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Stripe subscription created"
        );

        Ok(SubscriptionReceipt {
            client_secret: subscription
                .latest_invoice
                .and_then(|i| i.payment_intent)
                .and_then(|p| p.client_secret),
            subscription_id: subscription.id,
            customer_id: subscription.customer.or(Some(customer.id)),
            status: subscription.status,
        })
    }

    async fn change_plan(
        &self,
        subscription_id: &str,
        plan: &PlanPrice,
    ) -> Result<SubscriptionReceipt, PaymentError> {
        let current: StripeSubscription = self
            .get(&format!("/v1/subscriptions/{subscription_id}"))
            .await?;
        let item_id = current
            .items
            .and_then(|items| items.data.into_iter().next())
            .map(|item| item.id)
            .ok_or_else(|| PaymentError::Api {
                status: 200,
                body: format!("subscription {subscription_id} has no items"),
            })?;

        let price_id = self.create_price(plan).await?;

        let updated: StripeSubscription = self
            .post(
                &format!("/v1/subscriptions/{subscription_id}"),
                &vec![
                    field("items[0][id]", &item_id),
                    field("items[0][price]", &price_id),
                    field("proration_behavior", "create_prorations"),
                    field("metadata[plan_name]", &plan.name),
                ],
            )
            .await?;

        Ok(SubscriptionReceipt {
            subscription_id: updated.id,
            customer_id: updated.customer,
            client_secret: None,
            status: updated.status,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediate: bool,
    ) -> Result<CancellationReceipt, PaymentError> {
        let path = format!("/v1/subscriptions/{subscription_id}");
        let cancelled: StripeSubscription = if immediate {
            self.delete(&path).await?
        } else {
            self.post(&path, &vec![field("cancel_at_period_end", "true")])
                .await?
        };

        Ok(CancellationReceipt {
            subscription_id: cancelled.id,
            status: cancelled.status,
            cancel_at_period_end: cancelled.cancel_at_period_end,
        })
    }

    async fn charge_tokens(
        &self,
        request: &TokenChargeRequest,
    ) -> Result<PaymentReceipt, PaymentError> {
        let mut form = vec![
            field("amount", request.price_cents),
            field("currency", CURRENCY),
            field("confirm", "true"),
            field("payment_method_types[0]", "card"),
            field(
                "description",
                format!("{} tokens for {}", request.tokens, request.email),
            ),
            field("metadata[user_id]", request.user_id),
            field("metadata[token_amount]", request.tokens),
            field("metadata[type]", "token_purchase"),
        ];
        if let Some(pm) = &request.payment_method_id {
            form.push(field("payment_method", pm));
        }

        let intent: PaymentIntent = self.post("/v1/payment_intents", &form).await?;
        tracing::info!(
            user_id = request.user_id,
            payment_id = %intent.id,
            status = %intent.status,
            "Stripe token charge"
        );

        Ok(PaymentReceipt {
            payment_id: intent.id,
            status: intent.status,
        })
    }

    fn parse_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentError::NotConfigured("STRIPE_WEBHOOK_SECRET"))?;
        let header = signature
            .ok_or_else(|| PaymentError::InvalidSignature("missing Stripe-Signature".into()))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        verify_signature(payload, header, secret, now, DEFAULT_TOLERANCE_SECS)?;
        WebhookEvent::parse(payload)
    }
}
