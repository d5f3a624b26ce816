use dotenvy::dotenv;
use keymart_db::crypto::FieldCipher;
use keymart_db::repositories::{
    DialogRepository, LanguageRepository, PendingRepository, ProductRepository, ProofRepository,
};
use keymart_db::sync::SyncService;
use teloxide::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod config;
mod http;
mod i18n;
mod state;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keymart_bot=info,keymart_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting keymart bot...");

    let config = Config::from_env()?;
    let pool = keymart_db::connect(&config.database_url).await?;
    let cipher = FieldCipher::from_base64(&config.aes_key)?;

    let state = AppState {
        products: ProductRepository::new(pool.clone(), cipher.clone()),
        pending: PendingRepository::new(pool.clone()),
        dialogs: DialogRepository::new(pool.clone()),
        languages: LanguageRepository::new(pool.clone()),
        proofs: ProofRepository::new(pool.clone()),
        sync: SyncService::new(pool, cipher),
        admin_id: config.admin_id,
        admin_phone: config.admin_phone.clone(),
        totp_api_key: config.totp_api_key.clone(),
    };

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let http_state = state.clone();
    let http_addr = config.http_addr;
    let http_shutdown = shutdown_tx.subscribe();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http::serve(http_addr, http_state, http_shutdown).await {
            tracing::error!("Admin HTTP server failed: {:#}", e);
        }
    });

    let ctrl_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            let _ = ctrl_tx.send(());
        }
    });

    let bot = Bot::new(config.bot_token.clone());
    bot::run_bot(bot, shutdown_tx.subscribe(), state).await;

    // Dispatcher is gone; take the HTTP server down with it.
    let _ = shutdown_tx.send(());
    let _ = http_task.await;
    Ok(())
}
