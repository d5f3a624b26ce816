use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

pub const DEFAULT_LANG: &str = "en";

/// Per-user language preference, defaulting to English when unset.
#[derive(Debug, Clone)]
pub struct LanguageRepository {
    pool: SqlitePool,
}

impl LanguageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: i64) -> Result<String> {
        let row = sqlx::query("SELECT lang FROM languages WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch language")?;
        Ok(row
            .and_then(|r| r.try_get("lang").ok())
            .unwrap_or_else(|| DEFAULT_LANG.to_string()))
    }

    pub async fn set(&self, user_id: i64, lang: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO languages (user_id, lang) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET lang=excluded.lang",
        )
        .bind(user_id)
        .bind(lang)
        .execute(&self.pool)
        .await
        .context("Failed to set language")?;
        Ok(())
    }

    pub async fn list(&self) -> Result<BTreeMap<i64, String>> {
        let rows = sqlx::query("SELECT user_id, lang FROM languages")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list languages")?;
        Ok(rows
            .into_iter()
            .filter_map(|r| Some((r.try_get("user_id").ok()?, r.try_get("lang").ok()?)))
            .collect())
    }
}
