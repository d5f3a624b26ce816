use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Append-only payment evidence. Rows are written once, keyed by the chat
/// platform's file id, and never read back by bot logic.
#[derive(Debug, Clone)]
pub struct ProofRepository {
    pool: SqlitePool,
}

impl ProofRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        file_id: &str,
        user_id: i64,
        product_id: &str,
        data: &[u8],
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO proofs (id, user_id, product_id, data) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(file_id)
        .bind(user_id)
        .bind(product_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("Failed to store payment proof")?;
        Ok(())
    }
}
