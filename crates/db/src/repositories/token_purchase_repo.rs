//! Repository for the `token_purchases` table. Inserts happen through
//! [`TokenLedgerRepo::record_purchase`](super::TokenLedgerRepo::record_purchase).

use sqlx::PgPool;
use storyforge_core::types::DbId;

use crate::models::billing::TokenPurchase;

pub(crate) const COLUMNS: &str = "id, user_id, tokens_purchased, price_paid_cents, \
                        payment_method, payment_id, payment_status, purchase_reason, \
                        completed_at, created_at";

pub struct TokenPurchaseRepo;

impl TokenPurchaseRepo {
    /// A purchase owned by `user_id`; other users' ids are indistinguishable
    /// from missing ones.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<TokenPurchase>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM token_purchases WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, TokenPurchase>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<TokenPurchase>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM token_purchases WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, TokenPurchase>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
