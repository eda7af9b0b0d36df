//! Repository for the `billing_plans` table.

use sqlx::PgPool;
use storyforge_core::types::DbId;

use crate::models::billing::BillingPlan;

const COLUMNS: &str = "id, name, display_name, monthly_token_limit, max_projects, \
                        max_collaborators, monthly_price_cents, token_overage_price_per_1k_cents, \
                        features, is_active, is_public, created_at, updated_at";

pub struct BillingPlanRepo;

impl BillingPlanRepo {
    /// Active public plans, cheapest first.
    pub async fn list_public(pool: &PgPool) -> Result<Vec<BillingPlan>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM billing_plans
             WHERE is_active = true AND is_public = true
             ORDER BY monthly_price_cents, id"
        );
        sqlx::query_as::<_, BillingPlan>(&query).fetch_all(pool).await
    }

    pub async fn find_active_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<BillingPlan>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM billing_plans WHERE name = $1 AND is_active = true");
        sqlx::query_as::<_, BillingPlan>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BillingPlan>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM billing_plans WHERE id = $1");
        sqlx::query_as::<_, BillingPlan>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
