//! Handlers for the `/billing` resource: plans, subscriptions, token packs,
//! usage analytics and the payment webhook.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use storyforge_core::billing::{
    calculate_proration, classify_plan_change, purchase_status, subscription_status,
    token_pack_price_cents, PlanChange, PlanTier, Proration, BILLING_PERIOD_DAYS,
    CREDIT_REASON_PURCHASE,
};
use storyforge_core::error::CoreError;
use storyforge_core::tokens::{
    summarize_usage, UsageAnalytics, DEFAULT_ANALYTICS_DAYS, LOW_BALANCE_THRESHOLD,
    MAX_ANALYTICS_DAYS,
};
use storyforge_core::types::DbId;
use storyforge_db::models::billing::{
    BillingPlan, CreateSubscription, CreateTokenPurchase, TokenPurchase, UserSubscription,
};
use storyforge_db::models::token_usage::TokenUsageLog;
use storyforge_db::models::user::User;
use storyforge_db::repositories::{
    BillingPlanRepo, SubscriptionRepo, TokenLedgerRepo, TokenPurchaseRepo, TokenUsageRepo,
    UserRepo,
};
use storyforge_db::DbPool;
use storyforge_events::{kinds, StoryEvent};
use storyforge_payments::{
    PaymentError, PlanPrice, SubscriptionReceipt, SubscriptionRequest, TokenChargeRequest,
    WebhookEvent,
};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::{DaysParams, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the gateway's webhook signature.
const SIGNATURE_HEADER: &str = "stripe-signature";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub data: Vec<BillingPlan>,
    pub publishable_key: String,
    pub gateway: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub plan: String,
    pub tokens_limit: i64,
    pub tokens_used: i64,
    pub remaining: i64,
    pub percentage_used: f64,
    pub low_balance: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub plan: Option<BillingPlan>,
    pub subscription: Option<UserSubscription>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub subscription: UserSubscription,
    pub plan: BillingPlan,
    pub gateway: SubscriptionReceipt,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePlanResponse {
    pub subscription: UserSubscription,
    pub plan: BillingPlan,
    pub change: PlanChange,
    pub proration: Proration,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// End now instead of at the end of the period.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Deserialize)]
pub struct BuyTokensRequest {
    pub amount: i64,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuyTokensResponse {
    pub purchase: TokenPurchase,
    pub tokens_limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub usage: Vec<TokenUsageLog>,
    pub purchases: Vec<TokenPurchase>,
}

// ---------------------------------------------------------------------------
// Plans and balance
// ---------------------------------------------------------------------------

/// GET /api/v1/billing/plans
pub async fn list_plans(State(state): State<AppState>) -> AppResult<Json<PlansResponse>> {
    let plans = BillingPlanRepo::list_public(&state.pool).await?;
    Ok(Json(PlansResponse {
        data: plans,
        publishable_key: state.payments.publishable_key().to_string(),
        gateway: state.payments.name(),
    }))
}

/// GET /api/v1/billing/balance
pub async fn get_balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<BalanceResponse>> {
    let user = load_user(&state.pool, auth.user_id).await?;
    let remaining = user.tokens_limit - user.tokens_used;
    let percentage_used = if user.tokens_limit > 0 {
        (user.tokens_used as f64 / user.tokens_limit as f64 * 10_000.0).round() / 100.0
    } else {
        100.0
    };

    Ok(Json(BalanceResponse {
        plan: user.plan,
        tokens_limit: user.tokens_limit,
        tokens_used: user.tokens_used,
        remaining,
        percentage_used,
        low_balance: remaining < LOW_BALANCE_THRESHOLD,
    }))
}

/// GET /api/v1/billing/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<SubscriptionResponse>> {
    let user = load_user(&state.pool, auth.user_id).await?;
    let subscription = SubscriptionRepo::find_by_user(&state.pool, auth.user_id).await?;
    let plan = match &subscription {
        Some(sub) if sub.status != subscription_status::CANCELLED => {
            BillingPlanRepo::find_by_id(&state.pool, sub.plan_id).await?
        }
        _ => BillingPlanRepo::find_active_by_name(&state.pool, &user.plan).await?,
    };
    Ok(Json(SubscriptionResponse { plan, subscription }))
}

// ---------------------------------------------------------------------------
// Subscription lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/billing/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<SubscribeRequest>,
) -> AppResult<Json<DataResponse<SubscribeResponse>>> {
    let tier: PlanTier = input.plan.parse()?;
    if tier == PlanTier::Free {
        return Err(AppError::BadRequest(
            "The free plan does not need a subscription".into(),
        ));
    }
    let plan = load_plan(&state.pool, tier.as_str()).await?;
    let user = load_user(&state.pool, auth.user_id).await?;

    if let Some(existing) = SubscriptionRepo::find_by_user(&state.pool, auth.user_id).await? {
        if existing.status != subscription_status::CANCELLED {
            return Err(CoreError::Conflict(
                "You already have a subscription. Use upgrade to change plans.".into(),
            )
            .into());
        }
    }

    let receipt = state
        .payments
        .create_subscription(&SubscriptionRequest {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            plan: plan_price(&plan),
            payment_method_id: input.payment_method_id,
        })
        .await?;

    let now = Utc::now();
    let subscription = SubscriptionRepo::activate(
        &state.pool,
        &CreateSubscription {
            user_id: user.id,
            plan_id: plan.id,
            external_subscription_id: Some(receipt.subscription_id.clone()),
            external_customer_id: receipt.customer_id.clone(),
            period_start: now,
            period_end: now + Duration::days(BILLING_PERIOD_DAYS),
        },
        &plan,
    )
    .await?;

    publish_billing_event(
        &state,
        kinds::SUBSCRIPTION_STARTED,
        auth.user_id,
        &subscription,
        json!({ "plan": plan.name }),
    );
    tracing::info!(user_id = auth.user_id, plan = %plan.name, "Subscription started");

    Ok(Json(DataResponse {
        data: SubscribeResponse {
            subscription,
            plan,
            gateway: receipt,
        },
    }))
}

/// POST /api/v1/billing/upgrade
///
/// Moves an active subscription onto another paid plan. Upgrades are
/// prorated over the rest of the period; downgrades owe nothing.
pub async fn change_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ChangePlanRequest>,
) -> AppResult<Json<DataResponse<ChangePlanResponse>>> {
    let tier: PlanTier = input.plan.parse()?;
    let subscription = active_subscription(&state.pool, auth.user_id).await?;
    let current = BillingPlanRepo::find_by_id(&state.pool, subscription.plan_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "BillingPlan",
            id: subscription.plan_id,
        })?;
    let target = load_plan(&state.pool, tier.as_str()).await?;

    let change = classify_plan_change(current.monthly_price_cents, target.monthly_price_cents);
    if change == PlanChange::Same {
        return Err(AppError::BadRequest(format!(
            "You are already on the {} plan",
            current.display_name
        )));
    }
    if tier == PlanTier::Free {
        return Err(AppError::BadRequest(
            "Cancel the subscription to return to the free plan".into(),
        ));
    }

    let days_remaining = (subscription.current_period_end - Utc::now()).num_days();
    let proration = calculate_proration(
        current.monthly_price_cents,
        target.monthly_price_cents,
        days_remaining,
    );

    if let Some(external_id) = &subscription.external_subscription_id {
        state
            .payments
            .change_plan(external_id, &plan_price(&target))
            .await?;
    }
    let updated = SubscriptionRepo::change_plan(&state.pool, subscription.id, &target)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Subscription",
            id: subscription.id,
        })?;

    publish_billing_event(
        &state,
        kinds::SUBSCRIPTION_CHANGED,
        auth.user_id,
        &updated,
        json!({ "from": current.name, "to": target.name, "change": change }),
    );

    Ok(Json(DataResponse {
        data: ChangePlanResponse {
            subscription: updated,
            plan: target,
            change,
            proration,
        },
    }))
}

/// POST /api/v1/billing/cancel
///
/// By default the plan stays usable until the period ends; `immediate`
/// ends it now and drops the user onto the free plan.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<CancelRequest>>,
) -> AppResult<Json<DataResponse<UserSubscription>>> {
    let immediate = body.map(|Json(b)| b.immediate).unwrap_or_default();
    let subscription = active_subscription(&state.pool, auth.user_id).await?;

    if let Some(external_id) = &subscription.external_subscription_id {
        state
            .payments
            .cancel_subscription(external_id, immediate)
            .await?;
    }

    let updated = if immediate {
        let free = load_plan(&state.pool, PlanTier::Free.as_str()).await?;
        SubscriptionRepo::cancel_and_downgrade(&state.pool, subscription.id, &free).await?
    } else {
        SubscriptionRepo::mark_cancelling(&state.pool, subscription.id).await?
    };
    let updated = updated.ok_or(CoreError::NotFound {
        entity: "Subscription",
        id: subscription.id,
    })?;

    publish_billing_event(
        &state,
        kinds::SUBSCRIPTION_CANCELLED,
        auth.user_id,
        &updated,
        json!({ "immediate": immediate }),
    );

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Token packs
// ---------------------------------------------------------------------------

/// POST /api/v1/billing/buy-tokens
pub async fn buy_tokens(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<BuyTokensRequest>,
) -> AppResult<Json<DataResponse<BuyTokensResponse>>> {
    let price_cents = token_pack_price_cents(input.amount)?;
    let user = load_user(&state.pool, auth.user_id).await?;

    let receipt = state
        .payments
        .charge_tokens(&TokenChargeRequest {
            user_id: user.id,
            email: user.email.clone(),
            tokens: input.amount,
            price_cents,
            payment_method_id: input.payment_method_id,
        })
        .await?;
    if !receipt.succeeded() {
        tracing::warn!(
            user_id = user.id,
            payment_id = %receipt.payment_id,
            status = %receipt.status,
            "Token purchase not completed"
        );
        return Err(PaymentError::Declined(receipt.status).into());
    }

    let (purchase, user) = TokenLedgerRepo::record_purchase(
        &state.pool,
        &CreateTokenPurchase {
            user_id: user.id,
            tokens_purchased: input.amount,
            price_paid_cents: price_cents,
            payment_method: state.payments.name().to_string(),
            payment_id: Some(receipt.payment_id),
            payment_status: purchase_status::COMPLETED.to_string(),
            purchase_reason: CREDIT_REASON_PURCHASE.to_string(),
        },
    )
    .await?;

    state.event_bus.publish(
        StoryEvent::new(kinds::TOKENS_CREDITED)
            .with_source("token_purchase", purchase.id)
            .with_actor(user.id)
            .with_payload(json!({
                "amount": purchase.tokens_purchased,
                "price_cents": purchase.price_paid_cents,
            })),
    );

    Ok(Json(DataResponse {
        data: BuyTokensResponse {
            tokens_limit: user.tokens_limit,
            remaining: user.tokens_limit - user.tokens_used,
            purchase,
        },
    }))
}

// ---------------------------------------------------------------------------
// Usage and invoices
// ---------------------------------------------------------------------------

/// GET /api/v1/billing/usage?days=30
pub async fn usage_analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<DaysParams>,
) -> AppResult<Json<DataResponse<UsageAnalytics>>> {
    let days = params
        .days
        .unwrap_or(DEFAULT_ANALYTICS_DAYS)
        .clamp(1, MAX_ANALYTICS_DAYS);
    let user = load_user(&state.pool, auth.user_id).await?;
    let since = Utc::now() - Duration::days(days);
    let records = TokenUsageRepo::records_since(&state.pool, auth.user_id, since).await?;

    Ok(Json(DataResponse {
        data: summarize_usage(&records, days, user.tokens_limit, user.tokens_used),
    }))
}

/// GET /api/v1/billing/history
pub async fn billing_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<HistoryResponse>>> {
    let since = Utc::now() - Duration::days(MAX_ANALYTICS_DAYS);
    let usage =
        TokenUsageRepo::list_recent(&state.pool, auth.user_id, since, page.limit()).await?;
    let purchases = TokenPurchaseRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: HistoryResponse { usage, purchases },
    }))
}

/// GET /api/v1/billing/invoices/{id}
pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TokenPurchase>>> {
    let purchase = TokenPurchaseRepo::find_for_user(&state.pool, id, auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Invoice",
            id,
        })?;
    Ok(Json(DataResponse { data: purchase }))
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// POST /api/v1/billing/webhook
///
/// Unauthenticated; the gateway signs the raw body. Events for unknown
/// subscriptions are acknowledged so the gateway stops retrying.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let event = state.payments.parse_webhook(&body, signature)?;

    let subscription_id = match &event {
        WebhookEvent::InvoicePaid { subscription_id }
        | WebhookEvent::InvoicePaymentFailed { subscription_id }
        | WebhookEvent::SubscriptionDeleted { subscription_id } => subscription_id,
        WebhookEvent::Ignored { event_type } => {
            tracing::debug!(event_type = %event_type, "Webhook event ignored");
            return Ok(Json(json!({ "received": true })));
        }
    };

    let Some(subscription) =
        SubscriptionRepo::find_by_external_id(&state.pool, subscription_id).await?
    else {
        tracing::warn!(subscription_id = %subscription_id, "Webhook for unknown subscription");
        return Ok(Json(json!({ "received": true })));
    };

    let (kind, updated) = match event {
        WebhookEvent::InvoicePaid { .. } => (
            kinds::SUBSCRIPTION_RENEWED,
            SubscriptionRepo::renew_period(&state.pool, subscription.id).await?,
        ),
        WebhookEvent::InvoicePaymentFailed { .. } => (
            kinds::PAYMENT_FAILED,
            SubscriptionRepo::mark_past_due(&state.pool, subscription.id).await?,
        ),
        WebhookEvent::SubscriptionDeleted { .. } => {
            let free = load_plan(&state.pool, PlanTier::Free.as_str()).await?;
            (
                kinds::SUBSCRIPTION_CANCELLED,
                SubscriptionRepo::cancel_and_downgrade(&state.pool, subscription.id, &free)
                    .await?,
            )
        }
        WebhookEvent::Ignored { .. } => return Ok(Json(json!({ "received": true }))),
    };

    if let Some(updated) = updated {
        tracing::info!(
            user_id = updated.user_id,
            subscription_id = updated.id,
            kind,
            "Subscription updated by webhook"
        );
        publish_billing_event(
            &state,
            kind,
            updated.user_id,
            &updated,
            json!({ "source": "webhook" }),
        );
    }

    Ok(Json(json!({ "received": true })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_user(pool: &DbPool, user_id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "User",
                id: user_id,
            }
            .into()
        })
}

async fn load_plan(pool: &DbPool, name: &str) -> AppResult<BillingPlan> {
    BillingPlanRepo::find_active_by_name(pool, name)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Plan '{name}' is not available")))
}

/// The caller's subscription, unless it has already ended.
async fn active_subscription(pool: &DbPool, user_id: DbId) -> AppResult<UserSubscription> {
    match SubscriptionRepo::find_by_user(pool, user_id).await? {
        Some(sub) if sub.status != subscription_status::CANCELLED => Ok(sub),
        _ => Err(AppError::BadRequest("No active subscription".into())),
    }
}

fn plan_price(plan: &BillingPlan) -> PlanPrice {
    PlanPrice {
        name: plan.name.clone(),
        display_name: plan.display_name.clone(),
        monthly_price_cents: plan.monthly_price_cents,
        monthly_token_limit: plan.monthly_token_limit,
    }
}

fn publish_billing_event(
    state: &AppState,
    kind: &str,
    user_id: DbId,
    subscription: &UserSubscription,
    payload: serde_json::Value,
) {
    state.event_bus.publish(
        StoryEvent::new(kind)
            .with_source("subscription", subscription.id)
            .with_actor(user_id)
            .with_payload(payload),
    );
}
