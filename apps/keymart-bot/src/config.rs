use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Runtime configuration, read once at startup from the environment
/// (a local `.env` file is honored via dotenvy before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_id: i64,
    pub admin_phone: String,
    /// Base64-encoded 256-bit AES key for credential fields.
    pub aes_key: String,
    pub database_url: String,
    /// When unset, the /totp and /data HTTP routes are not mounted at all.
    pub totp_api_key: Option<String>,
    pub http_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let admin_id = env::var("ADMIN_ID")
            .context("ADMIN_ID is not set")?
            .parse::<i64>()
            .context("ADMIN_ID must be a numeric Telegram chat id")?;
        let admin_phone = env::var("ADMIN_PHONE").unwrap_or_default();
        let aes_key = env::var("AES_KEY").context("AES_KEY is not set")?;
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://keymart.db?mode=rwc".to_string());
        let totp_api_key = env::var("TOTP_API_KEY").ok().filter(|k| !k.is_empty());
        let http_addr = env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse::<SocketAddr>()
            .context("HTTP_ADDR must be a socket address like 127.0.0.1:8787")?;

        Ok(Self {
            bot_token,
            admin_id,
            admin_phone,
            aes_key,
            database_url,
            totp_api_key,
            http_addr,
        })
    }
}
