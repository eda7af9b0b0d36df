//! Integration tests for the transactional token ledger.

use assert_matches::assert_matches;
use sqlx::PgPool;
use storyforge_db::models::billing::CreateTokenPurchase;
use storyforge_db::models::project::CreateProject;
use storyforge_db::models::token_usage::NewCharge;
use storyforge_db::models::user::{CreateUser, User};
use storyforge_db::repositories::{
    ChargeOutcome, CreditKind, ProjectRepo, TokenLedgerRepo, TokenPurchaseRepo, TokenUsageRepo,
    UserRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn user_with_usage(pool: &PgPool, name: &str, used: i64) -> User {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            username: name.to_string(),
            email: format!("{name}@test.com"),
            password_hash: "hash".to_string(),
            role: "user".to_string(),
        },
    )
    .await
    .unwrap();
    sqlx::query("UPDATE users SET tokens_used = $2 WHERE id = $1")
        .bind(user.id)
        .bind(used)
        .execute(pool)
        .await
        .unwrap();
    UserRepo::find_by_id(pool, user.id).await.unwrap().unwrap()
}

fn charge(user_id: i64, cost: i64) -> NewCharge {
    NewCharge {
        user_id,
        project_id: None,
        scene_id: None,
        operation_type: "analyze_idea".to_string(),
        input_tokens: 10,
        output_tokens: 80,
        total_cost: cost,
        multiplier_bp: 10_000,
        ai_model_used: Some("simulation".to_string()),
        response_time_ms: Some(5),
        operation_metadata: serde_json::json!({}),
    }
}

async fn log_count(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM token_usage_logs WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Charges
// ---------------------------------------------------------------------------

/// Spending exactly the remaining balance is allowed.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charge_to_exact_limit(pool: PgPool) {
    let user = user_with_usage(&pool, "exact", 995).await;

    let outcome = TokenLedgerRepo::charge(&pool, &charge(user.id, 5)).await.unwrap();

    assert_matches!(
        outcome,
        ChargeOutcome::Charged { tokens_used: 1000, remaining: 0, .. }
    );
    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.tokens_used, 1000);
    assert_eq!(log_count(&pool, user.id).await, 1);
}

/// One token short is refused with the deficit and nothing is written.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charge_insufficient_leaves_balance(pool: PgPool) {
    let user = user_with_usage(&pool, "short", 995).await;

    let outcome = TokenLedgerRepo::charge(&pool, &charge(user.id, 6)).await.unwrap();

    let ChargeOutcome::Insufficient(check) = outcome else {
        panic!("expected refusal, got {outcome:?}");
    };
    assert_eq!(check.deficit, Some(1));
    assert_eq!(check.remaining, 5);

    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.tokens_used, 995);
    assert_eq!(log_count(&pool, user.id).await, 0);
}

/// A charge touches only the charged user.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charge_isolated_to_user(pool: PgPool) {
    let payer = user_with_usage(&pool, "payer", 0).await;
    let bystander = user_with_usage(&pool, "bystander", 100).await;

    TokenLedgerRepo::charge(&pool, &charge(payer.id, 56)).await.unwrap();

    let payer = UserRepo::find_by_id(&pool, payer.id).await.unwrap().unwrap();
    let bystander = UserRepo::find_by_id(&pool, bystander.id).await.unwrap().unwrap();
    assert_eq!(payer.tokens_used, 56);
    assert_eq!(bystander.tokens_used, 100);
    assert_eq!(bystander.tokens_limit, 1000);
}

/// Concurrent charges never overdraw: of 20 charges of 100 against a 1000
/// limit, exactly 10 succeed.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_charges_do_not_overdraw(pool: PgPool) {
    let user = user_with_usage(&pool, "racer", 0).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let pool = pool.clone();
            let input = charge(user.id, 100);
            tokio::spawn(async move { TokenLedgerRepo::charge(&pool, &input).await.unwrap() })
        })
        .collect();

    let mut charged = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), ChargeOutcome::Charged { .. }) {
            charged += 1;
        }
    }

    assert_eq!(charged, 10);
    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.tokens_used, 1000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charge_unknown_user(pool: PgPool) {
    let result = TokenLedgerRepo::charge(&pool, &charge(999_999, 1)).await;
    assert_matches!(result, Err(sqlx::Error::RowNotFound));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charges_feed_usage_records(pool: PgPool) {
    let user = user_with_usage(&pool, "reader", 0).await;
    TokenLedgerRepo::charge(&pool, &charge(user.id, 8)).await.unwrap();
    TokenLedgerRepo::charge(&pool, &charge(user.id, 12)).await.unwrap();

    let since = chrono::Utc::now() - chrono::Duration::days(1);
    let records = TokenUsageRepo::records_since(&pool, user.id, since).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records.iter().map(|r| r.total_cost).sum::<i64>(), 20);
}

async fn project_count(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn project(title: &str) -> CreateProject {
    CreateProject {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Writes made in the charge's transaction commit together with it.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_charge_in_tx_commits_with_writes(pool: PgPool) {
    let user = user_with_usage(&pool, "builder", 0).await;

    let mut tx = pool.begin().await.unwrap();
    assert_eq!(
        TokenLedgerRepo::lock_balance(&mut tx, user.id).await.unwrap(),
        (1000, 0)
    );
    let created = ProjectRepo::create(&mut *tx, user.id, &project("Paid")).await.unwrap();
    let outcome = TokenLedgerRepo::charge_in_tx(&mut tx, &charge(user.id, 40)).await.unwrap();
    assert_matches!(outcome, ChargeOutcome::Charged { tokens_used: 40, .. });
    tx.commit().await.unwrap();

    assert!(ProjectRepo::find_by_id(&pool, created.id).await.unwrap().is_some());
    assert_eq!(log_count(&pool, user.id).await, 1);
}

/// A balance drained after the quote refuses the charge, and rolling back
/// discards the work it would have paid for.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refused_charge_in_tx_discards_writes(pool: PgPool) {
    let user = user_with_usage(&pool, "drained", 0).await;

    let mut tx = pool.begin().await.unwrap();

    // Another request spends the balance before this one writes and charges.
    let spent = TokenLedgerRepo::charge(&pool, &charge(user.id, 990)).await.unwrap();
    assert_matches!(spent, ChargeOutcome::Charged { remaining: 10, .. });

    ProjectRepo::create(&mut *tx, user.id, &project("Unpaid")).await.unwrap();
    let outcome = TokenLedgerRepo::charge_in_tx(&mut tx, &charge(user.id, 40)).await.unwrap();
    assert_matches!(outcome, ChargeOutcome::Insufficient(ref check) if check.deficit == Some(30));
    tx.rollback().await.unwrap();

    assert_eq!(project_count(&pool, user.id).await, 0);
    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.tokens_used, 990);
    assert_eq!(log_count(&pool, user.id).await, 1);
}

// ---------------------------------------------------------------------------
// Credits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bonus_credit_floors_at_zero(pool: PgPool) {
    let user = user_with_usage(&pool, "bonus", 30).await;

    let user = TokenLedgerRepo::credit(&pool, user.id, 50, CreditKind::Bonus)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.tokens_used, 0);
    assert_eq!(user.tokens_limit, 1000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_purchase_raises_limit_and_records_invoice(pool: PgPool) {
    let user = user_with_usage(&pool, "buyer", 400).await;

    let (purchase, user) = TokenLedgerRepo::record_purchase(
        &pool,
        &CreateTokenPurchase {
            user_id: user.id,
            tokens_purchased: 5000,
            price_paid_cents: 1495,
            payment_method: "simulation".to_string(),
            payment_id: Some("sim_pi_1_1495".to_string()),
            payment_status: "completed".to_string(),
            purchase_reason: "purchase".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(user.tokens_limit, 6000);
    assert_eq!(user.tokens_used, 400);
    assert!(purchase.completed_at.is_some());

    let found = TokenPurchaseRepo::find_for_user(&pool, purchase.id, user.id)
        .await
        .unwrap();
    assert!(found.is_some());
    let other = TokenPurchaseRepo::find_for_user(&pool, purchase.id, user.id + 1)
        .await
        .unwrap();
    assert!(other.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_unknown_user(pool: PgPool) {
    let result = TokenLedgerRepo::credit(&pool, 424_242, 10, CreditKind::Purchase)
        .await
        .unwrap();
    assert!(result.is_none());
}
