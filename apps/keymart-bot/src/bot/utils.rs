use keymart_db::models::Product;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;
use tracing::{error, warn};

use crate::state::AppState;

/// Send a plain message with one bounded retry. Delivery failure is logged
/// and swallowed; it must never change the outcome of the data operation
/// that preceded it.
pub async fn send(bot: &Bot, chat_id: i64, text: &str) {
    if let Err(e) = bot.send_message(ChatId(chat_id), text).await {
        warn!("send to {} failed, retrying once: {}", chat_id, e);
        if let Err(e) = bot.send_message(ChatId(chat_id), text).await {
            error!("send to {} failed after retry: {}", chat_id, e);
        }
    }
}

/// Same retry contract as [`send`], with an inline keyboard attached.
pub async fn send_kb(bot: &Bot, chat_id: i64, text: &str, kb: InlineKeyboardMarkup) {
    if let Err(e) = bot
        .send_message(ChatId(chat_id), text)
        .reply_markup(kb.clone())
        .await
    {
        warn!("send to {} failed, retrying once: {}", chat_id, e);
        if let Err(e) = bot.send_message(ChatId(chat_id), text).reply_markup(kb).await {
            error!("send to {} failed after retry: {}", chat_id, e);
        }
    }
}

/// Language for a user, falling back to the default when the lookup fails.
pub async fn user_lang(state: &AppState, user_id: i64) -> String {
    match state.languages.get(user_id).await {
        Ok(lang) => lang,
        Err(e) => {
            warn!("language lookup for {} failed: {:#}", user_id, e);
            keymart_db::repositories::lang_repo::DEFAULT_LANG.to_string()
        }
    }
}

/// One-line product listing entry.
pub fn product_line(id: &str, product: &Product) -> String {
    match &product.name {
        Some(name) => format!("• {} — {} ({})", name, product.price, id),
        None => format!("• {} — {}", id, product.price),
    }
}

/// Credential block sent to a buyer on approval or resend.
pub fn format_credentials(intro: &str, id: &str, product: &Product) -> String {
    let title = product.name.as_deref().unwrap_or(id);
    format!(
        "{intro}\n\n📦 {title}\n👤 {username}\n🔒 {password}",
        username = product.username,
        password = product.password,
    )
}
