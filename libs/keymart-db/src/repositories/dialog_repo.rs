use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::warn;

use crate::models::{AddDraft, AddFlow, AddStep, ConversationState, EditFlow};

/// Per-user conversation state, one row per user. Starting a flow replaces
/// whatever row existed, so "at most one flow per user" holds structurally.
#[derive(Debug, Clone)]
pub struct DialogRepository {
    pool: SqlitePool,
}

fn row_to_state(row: &SqliteRow) -> Option<ConversationState> {
    let kind: String = row.try_get("kind").ok()?;
    match kind.as_str() {
        "add" => {
            let step = AddStep::parse(&row.try_get::<String, _>("step").ok()?)?;
            let draft_json: String = row.try_get("draft").unwrap_or_else(|_| "{}".to_string());
            let draft: AddDraft = serde_json::from_str(&draft_json).unwrap_or_default();
            Some(ConversationState::AddingProduct(AddFlow { step, draft }))
        }
        "edit" => Some(ConversationState::EditingField(EditFlow {
            product_id: row.try_get("product_id").ok()?,
            field: row.try_get("field").ok()?,
        })),
        other => {
            warn!("unknown dialog kind {:?}, ignoring row", other);
            None
        }
    }
}

impl DialogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn state(&self, user_id: i64) -> Result<Option<ConversationState>> {
        let row = sqlx::query("SELECT * FROM dialogs WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch conversation state")?;
        Ok(row.as_ref().and_then(row_to_state))
    }

    /// Begin an add flow at the first step. Restarting overwrites any stale
    /// flow for the same user.
    pub async fn start_add(&self, user_id: i64) -> Result<()> {
        self.save_add(
            user_id,
            &AddFlow {
                step: AddStep::Id,
                draft: AddDraft::default(),
            },
        )
        .await
    }

    pub async fn save_add(&self, user_id: i64, flow: &AddFlow) -> Result<()> {
        let draft = serde_json::to_string(&flow.draft)?;
        sqlx::query(
            "INSERT INTO dialogs (user_id, kind, step, draft, product_id, field) \
             VALUES (?1, 'add', ?2, ?3, NULL, NULL) \
             ON CONFLICT(user_id) DO UPDATE SET kind='add', step=excluded.step, \
             draft=excluded.draft, product_id=NULL, field=NULL",
        )
        .bind(user_id)
        .bind(flow.step.as_str())
        .bind(&draft)
        .execute(&self.pool)
        .await
        .context("Failed to save add flow")?;
        Ok(())
    }

    /// Begin an edit flow. The field name is stored raw and validated when
    /// the value arrives.
    pub async fn start_edit(&self, user_id: i64, product_id: &str, field: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO dialogs (user_id, kind, step, draft, product_id, field) \
             VALUES (?1, 'edit', NULL, NULL, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET kind='edit', step=NULL, draft=NULL, \
             product_id=excluded.product_id, field=excluded.field",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(field)
        .execute(&self.pool)
        .await
        .context("Failed to save edit flow")?;
        Ok(())
    }

    pub async fn clear(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM dialogs WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to clear conversation state")?;
        Ok(())
    }
}
