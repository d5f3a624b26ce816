use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::warn;

use crate::crypto::FieldCipher;
use crate::models::{EditableField, Product};

pub(crate) const UPSERT_PRODUCT_SQL: &str = "INSERT INTO products (id, price, username, password, secret, name, buyers) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
     ON CONFLICT(id) DO UPDATE SET price=excluded.price, username=excluded.username, \
     password=excluded.password, secret=excluded.secret, name=excluded.name, buyers=excluded.buyers";

/// Repository for product records. Credential fields are encrypted with a
/// fresh nonce on every write and never leave this type encrypted on reads.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    cipher: FieldCipher,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, cipher: FieldCipher) -> Self {
        Self { pool, cipher }
    }

    /// Tolerant per-field decrypt: a bad token empties that one field and the
    /// rest of the record survives.
    fn decrypt_field(&self, id: &str, field: &str, token: &str) -> String {
        match self.cipher.decrypt(token) {
            Ok(value) => value,
            Err(e) => {
                warn!("failed to decrypt {} for product {}: {}", field, id, e);
                String::new()
            }
        }
    }

    fn row_to_product(&self, id: &str, row: &SqliteRow) -> Product {
        let buyers_json: String = row.try_get("buyers").unwrap_or_else(|_| "[]".to_string());
        let buyers: Vec<i64> = serde_json::from_str(&buyers_json).unwrap_or_default();
        let product = Product {
            price: row.try_get("price").unwrap_or_default(),
            username: self
                .decrypt_field(id, "username", &row.try_get::<String, _>("username").unwrap_or_default()),
            password: self
                .decrypt_field(id, "password", &row.try_get::<String, _>("password").unwrap_or_default()),
            secret: self
                .decrypt_field(id, "secret", &row.try_get::<String, _>("secret").unwrap_or_default()),
            name: row.try_get::<Option<String>, _>("name").ok().flatten(),
            buyers,
        };
        Product {
            buyers: product.normalized_buyers(),
            ..product
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product")?;
        Ok(row.map(|r| self.row_to_product(id, &r)))
    }

    pub async fn list(&self) -> Result<BTreeMap<String, Product>> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list products")?;
        let mut out = BTreeMap::new();
        for row in rows {
            let id: String = row.try_get("id").unwrap_or_default();
            let product = self.row_to_product(&id, &row);
            out.insert(id, product);
        }
        Ok(out)
    }

    /// Insert-or-replace keyed by id. Idempotent storage, not idempotent
    /// ciphertext: every call re-encrypts under fresh nonces.
    pub async fn upsert(&self, id: &str, product: &Product) -> Result<()> {
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
            .execute(&self.pool)
            .await
            .context("Failed to upsert product")?;
        Ok(())
    }

    /// No error if the product is absent.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete product")?;
        Ok(())
    }

    /// Update one editable field. Credential variants are encrypted first;
    /// the field set is closed at the type level, so no dynamic SQL.
    pub async fn update_field(&self, id: &str, field: EditableField, value: &str) -> Result<()> {
        // An empty name clears the optional display name.
        let stored: Option<String> = if field.is_credential() {
            Some(self.cipher.encrypt(value)?)
        } else if field == EditableField::Name && value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        let sql = match field {
            EditableField::Price => "UPDATE products SET price = ?1 WHERE id = ?2",
            EditableField::Username => "UPDATE products SET username = ?1 WHERE id = ?2",
            EditableField::Password => "UPDATE products SET password = ?1 WHERE id = ?2",
            EditableField::Secret => "UPDATE products SET secret = ?1 WHERE id = ?2",
            EditableField::Name => "UPDATE products SET name = ?1 WHERE id = ?2",
        };
        sqlx::query(sql)
            .bind(&stored)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update product field")?;
        Ok(())
    }

    async fn save_buyers(&self, id: &str, buyers: &[i64]) -> Result<()> {
        let json = serde_json::to_string(buyers)?;
        sqlx::query("UPDATE products SET buyers = ?1 WHERE id = ?2")
            .bind(&json)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update buyers")?;
        Ok(())
    }

    /// Idempotent; no-op if the product is absent.
    pub async fn add_buyer(&self, id: &str, user_id: i64) -> Result<()> {
        let Some(product) = self.get(id).await? else {
            return Ok(());
        };
        let mut buyers = product.buyers;
        if !buyers.contains(&user_id) {
            buyers.push(user_id);
            self.save_buyers(id, &buyers).await?;
        }
        Ok(())
    }

    /// No-op for absent products and absent buyers.
    pub async fn remove_buyer(&self, id: &str, user_id: i64) -> Result<()> {
        let Some(product) = self.get(id).await? else {
            return Ok(());
        };
        let buyers: Vec<i64> = product.buyers.into_iter().filter(|&u| u != user_id).collect();
        self.save_buyers(id, &buyers).await
    }

    pub async fn clear_buyers(&self, id: &str) -> Result<()> {
        if self.get(id).await?.is_none() {
            return Ok(());
        }
        self.save_buyers(id, &[]).await
    }
}
