use sqlx::PgPool;
use storyforge_db::repositories::BillingPlanRepo;

/// Migrations apply cleanly and seed the three plans.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    storyforge_db::health_check(&pool).await.unwrap();

    let plans = BillingPlanRepo::list_public(&pool).await.unwrap();
    let names: Vec<_> = plans.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["free", "pro", "enterprise"]);

    let free = &plans[0];
    assert_eq!(free.monthly_token_limit, 1000);
    assert_eq!(free.max_projects, 3);
    assert_eq!(free.monthly_price_cents, 0);

    let pro = &plans[1];
    assert_eq!(pro.monthly_token_limit, 10_000);
    assert_eq!(pro.max_collaborators, 5);
    assert_eq!(pro.monthly_price_cents, 1999);
    assert!(pro.features.as_array().unwrap().iter().any(|f| f == "ai_critics"));

    let enterprise = &plans[2];
    assert_eq!(enterprise.monthly_token_limit, 50_000);
    assert_eq!(enterprise.max_collaborators, -1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_updated_at_trigger(pool: PgPool) {
    let (id, before): (i64, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
        "INSERT INTO users (username, email, password_hash) VALUES ('t', 't@x.io', 'h')
         RETURNING id, updated_at",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let after: chrono::DateTime<chrono::Utc> =
        sqlx::query_scalar("UPDATE users SET plan = 'pro' WHERE id = $1 RETURNING updated_at")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert!(after >= before);
}
