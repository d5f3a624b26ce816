pub mod crypto;
pub mod flows;
pub mod models;
pub mod repositories;
pub mod sync;
pub mod totp;

pub use sqlx;
use anyhow::{Context, Result};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn connect(url: &str) -> Result<sqlx::SqlitePool> {
    let pool = sqlx::SqlitePool::connect(url)
        .await
        .context("Failed to connect to SQLite")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run DB migrations")?;

    Ok(pool)
}
