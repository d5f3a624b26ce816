use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::models::PendingPurchase;

/// Ledger of buy intents awaiting admin approval. `user_id` is the primary
/// key, so a user has at most one outstanding request at a time.
#[derive(Debug, Clone)]
pub struct PendingRepository {
    pool: SqlitePool,
}

impl PendingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<PendingPurchase>> {
        let rows = sqlx::query("SELECT user_id, product_id FROM pending ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list pending purchases")?;
        Ok(rows
            .into_iter()
            .map(|r| PendingPurchase {
                user_id: r.try_get("user_id").unwrap_or_default(),
                product_id: r.try_get("product_id").unwrap_or_default(),
            })
            .collect())
    }

    /// Replace-if-exists: a second request overwrites the first row.
    pub async fn add(&self, user_id: i64, product_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO pending (user_id, product_id) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET product_id=excluded.product_id",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .context("Failed to add pending purchase")?;
        Ok(())
    }

    pub async fn remove(&self, user_id: i64, product_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM pending WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove pending purchase")?;
        Ok(())
    }

    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<PendingPurchase>> {
        let row = sqlx::query("SELECT user_id, product_id FROM pending WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch pending purchase")?;
        Ok(row.map(|r| PendingPurchase {
            user_id: r.try_get("user_id").unwrap_or_default(),
            product_id: r.try_get("product_id").unwrap_or_default(),
        }))
    }
}
