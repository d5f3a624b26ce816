//! Reconciling bulk sync: whole-snapshot export and diff-based import.
//!
//! Import never truncates a table. It reads the keys currently stored,
//! upserts everything the snapshot names and deletes only the leftovers, all
//! inside one transaction, so concurrent readers never observe a window with
//! zero rows.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::crypto::FieldCipher;
use crate::models::{AddDraft, AddFlow, AddStep, EditFlow, PendingPurchase, Product, Snapshot};
use crate::repositories::product_repo::UPSERT_PRODUCT_SQL;

#[derive(Debug, Clone)]
pub struct SyncService {
    pool: SqlitePool,
    cipher: FieldCipher,
}

impl SyncService {
    pub fn new(pool: SqlitePool, cipher: FieldCipher) -> Self {
        Self { pool, cipher }
    }

    /// Full in-memory copy of all five collections, credentials decrypted.
    /// Decryption is tolerant here: a bad token empties that field only.
    pub async fn export(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        let rows = sqlx::query("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read products for export")?;
        for row in rows {
            let id: String = row.try_get("id").unwrap_or_default();
            let buyers: Vec<i64> =
                serde_json::from_str(&row.try_get::<String, _>("buyers").unwrap_or_default())
                    .unwrap_or_default();
            let product = Product {
                price: row.try_get("price").unwrap_or_default(),
                username: self
                    .cipher
                    .decrypt_or_empty(&row.try_get::<String, _>("username").unwrap_or_default()),
                password: self
                    .cipher
                    .decrypt_or_empty(&row.try_get::<String, _>("password").unwrap_or_default()),
                secret: self
                    .cipher
                    .decrypt_or_empty(&row.try_get::<String, _>("secret").unwrap_or_default()),
                name: row.try_get::<Option<String>, _>("name").ok().flatten(),
                buyers,
            };
            snapshot.products.insert(
                id,
                Product {
                    buyers: product.normalized_buyers(),
                    ..product
                },
            );
        }

        let rows = sqlx::query("SELECT user_id, product_id FROM pending ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read pending for export")?;
        snapshot.pending = rows
            .into_iter()
            .map(|r| PendingPurchase {
                user_id: r.try_get("user_id").unwrap_or_default(),
                product_id: r.try_get("product_id").unwrap_or_default(),
            })
            .collect();

        let rows = sqlx::query("SELECT * FROM dialogs")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read dialogs for export")?;
        for row in rows {
            let user_id: i64 = row.try_get("user_id").unwrap_or_default();
            match row.try_get::<String, _>("kind").unwrap_or_default().as_str() {
                "add" => {
                    let step = AddStep::parse(&row.try_get::<String, _>("step").unwrap_or_default())
                        .unwrap_or_default();
                    let draft: AddDraft =
                        serde_json::from_str(&row.try_get::<String, _>("draft").unwrap_or_default())
                            .unwrap_or_default();
                    snapshot.add_states.insert(user_id, AddFlow { step, draft });
                }
                "edit" => {
                    snapshot.edit_states.insert(
                        user_id,
                        EditFlow {
                            product_id: row.try_get("product_id").unwrap_or_default(),
                            field: row.try_get("field").unwrap_or_default(),
                        },
                    );
                }
                other => warn!("skipping dialog row with unknown kind {:?}", other),
            }
        }

        let rows = sqlx::query("SELECT user_id, lang FROM languages")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read languages for export")?;
        for row in rows {
            let user_id: i64 = row.try_get("user_id").unwrap_or_default();
            snapshot
                .languages
                .insert(user_id, row.try_get("lang").unwrap_or_default());
        }

        Ok(snapshot)
    }

    /// Diff-apply the snapshot: upsert every key it names, delete every
    /// stored key it omits. One transaction; partial application is never
    /// visible.
    pub async fn import(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin import")?;

        // Products.
        let rows = sqlx::query("SELECT id FROM products")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read product ids")?;
        let mut stale: BTreeSet<String> = rows
            .into_iter()
            .filter_map(|r| r.try_get("id").ok())
            .collect();
        for (id, product) in &snapshot.products {
            stale.remove(id);
            let username = self.cipher.encrypt(&product.username)?;
            let password = self.cipher.encrypt(&product.password)?;
            let secret = self.cipher.encrypt(&product.secret)?;
            let buyers = serde_json::to_string(&product.normalized_buyers())?;
            sqlx::query(UPSERT_PRODUCT_SQL)
                .bind(id)
                .bind(&product.price)
                .bind(&username)
                .bind(&password)
                .bind(&secret)
                .bind(&product.name)
                .bind(&buyers)
                .execute(&mut *tx)
                .await
                .context("Failed to upsert product during import")?;
        }
        for id in stale {
            sqlx::query("DELETE FROM products WHERE id = ?1")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete stale product")?;
        }

        // Pending.
        let rows = sqlx::query("SELECT user_id, product_id FROM pending")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read pending keys")?;
        let mut stale: BTreeSet<(i64, String)> = rows
            .into_iter()
            .filter_map(|r| Some((r.try_get("user_id").ok()?, r.try_get("product_id").ok()?)))
            .collect();
        for entry in &snapshot.pending {
            stale.remove(&(entry.user_id, entry.product_id.clone()));
            sqlx::query(
                "INSERT INTO pending (user_id, product_id) VALUES (?1, ?2) \
                 ON CONFLICT(user_id) DO UPDATE SET product_id=excluded.product_id",
            )
            .bind(entry.user_id)
            .bind(&entry.product_id)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert pending during import")?;
        }
        for (user_id, product_id) in stale {
            sqlx::query("DELETE FROM pending WHERE user_id = ?1 AND product_id = ?2")
                .bind(user_id)
                .bind(&product_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete stale pending")?;
        }

        // Dialogs back both the add-state and the edit-state collections;
        // the diff runs over the union of their user ids.
        let rows = sqlx::query("SELECT user_id FROM dialogs")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read dialog keys")?;
        let mut stale: BTreeSet<i64> = rows
            .into_iter()
            .filter_map(|r| r.try_get("user_id").ok())
            .collect();
        for (&user_id, flow) in &snapshot.add_states {
            stale.remove(&user_id);
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
            .execute(&mut *tx)
            .await
            .context("Failed to upsert add state during import")?;
        }
        for (&user_id, flow) in &snapshot.edit_states {
            stale.remove(&user_id);
            sqlx::query(
                "INSERT INTO dialogs (user_id, kind, step, draft, product_id, field) \
                 VALUES (?1, 'edit', NULL, NULL, ?2, ?3) \
                 ON CONFLICT(user_id) DO UPDATE SET kind='edit', step=NULL, draft=NULL, \
                 product_id=excluded.product_id, field=excluded.field",
            )
            .bind(user_id)
            .bind(&flow.product_id)
            .bind(&flow.field)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert edit state during import")?;
        }
        for user_id in stale {
            sqlx::query("DELETE FROM dialogs WHERE user_id = ?1")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete stale dialog")?;
        }

        // Languages.
        let rows = sqlx::query("SELECT user_id FROM languages")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read language keys")?;
        let mut stale: BTreeSet<i64> = rows
            .into_iter()
            .filter_map(|r| r.try_get("user_id").ok())
            .collect();
        for (&user_id, lang) in &snapshot.languages {
            stale.remove(&user_id);
            sqlx::query(
                "INSERT INTO languages (user_id, lang) VALUES (?1, ?2) \
                 ON CONFLICT(user_id) DO UPDATE SET lang=excluded.lang",
            )
            .bind(user_id)
            .bind(lang)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert language during import")?;
        }
        for user_id in stale {
            sqlx::query("DELETE FROM languages WHERE user_id = ?1")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete stale language")?;
        }

        tx.commit().await.context("Failed to commit import")?;
        Ok(())
    }
}
