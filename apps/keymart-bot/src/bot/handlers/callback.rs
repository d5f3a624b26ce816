use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info};

use crate::bot::handlers::command;
use crate::bot::keyboards::{
    delete_confirm_keyboard, edit_fields_keyboard, language_keyboard, manage_product_keyboard,
};
use crate::bot::utils::{send, send_kb, user_lang};
use crate::i18n::tr;
use crate::state::AppState;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("callback from {}: {:?}", q.from.id, q.data);
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let user_id = q.from.id.0 as i64;
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let lang = user_lang(&state, user_id).await;

    if let Err(e) = dispatch(&bot, &state, user_id, &lang, &data).await {
        error!("callback {:?} from {} failed: {:#}", data, user_id, e);
        send(&bot, user_id, "⚠️ Something went wrong, please try again.").await;
    }
    Ok(())
}

async fn dispatch(bot: &Bot, state: &AppState, user_id: i64, lang: &str, data: &str) -> Result<()> {
    let parts: Vec<&str> = data.split(':').collect();
    match parts.as_slice() {
        ["menu", "products"] => command::send_product_list(bot, state, user_id, lang).await?,
        ["menu", "contact"] => {
            let text = format!("{} {}", tr("contact", lang), state.admin_phone);
            send(bot, user_id, &text).await;
        }
        ["menu", "help"] => {
            let mut text = tr("help", lang).to_string();
            if state.is_admin(user_id) {
                text.push_str(tr("help_admin", lang));
            }
            send(bot, user_id, &text).await;
        }
        ["menu", "language"] => {
            send_kb(bot, user_id, tr("choose_language", lang), language_keyboard()).await;
        }
        ["language", code] => command::set_language(bot, state, user_id, lang, code).await?,

        ["buy", pid] => buy(bot, state, user_id, lang, pid).await?,
        ["code", pid] => command::send_code(bot, state, user_id, lang, pid).await?,

        // Admin surface.
        _ if !state.is_admin(user_id) => {
            send(bot, user_id, tr("unauthorized", lang)).await;
        }
        ["adminmenu", "pending"] => command::send_pending_list(bot, state, user_id, lang).await?,
        ["adminmenu", "manage"] => manage_list(bot, state, user_id, lang).await?,
        ["adminmenu", "addproduct"] => {
            state.dialogs.start_add(user_id).await?;
            send(bot, user_id, tr("prompt_id", lang)).await;
        }
        ["adminmenu", "stats"] => command::send_stats(bot, state, user_id).await?,

        ["admin", "approve", uid, pid] => {
            if let Ok(uid) = uid.parse::<i64>() {
                command::approve(bot, state, user_id, lang, uid, pid).await?;
            }
        }
        ["admin", "reject", uid, pid] => {
            if let Ok(uid) = uid.parse::<i64>() {
                command::reject(bot, state, user_id, lang, uid, pid).await?;
            }
        }
        ["admin", "deletebuyer", pid, uid] => {
            if let Ok(uid) = uid.parse::<i64>() {
                state.products.remove_buyer(pid, uid).await?;
                send(bot, user_id, tr("buyer_deleted", lang)).await;
            }
        }

        ["editprod", pid] => {
            send_kb(bot, user_id, tr("edit_pick_field", lang), edit_fields_keyboard(pid)).await;
        }
        ["editfield", pid, field] => {
            if state.products.get(pid).await?.is_none() {
                send(bot, user_id, tr("product_not_found", lang)).await;
            } else {
                state.dialogs.start_edit(user_id, pid, field).await?;
                send(bot, user_id, tr("edit_prompt", lang)).await;
            }
        }
        ["buyerlist", pid] => buyer_list(bot, state, user_id, lang, pid).await?,
        ["adminclearbuyers", pid] => {
            state.products.clear_buyers(pid).await?;
            send(bot, user_id, tr("buyers_cleared", lang)).await;
        }
        ["adminresend", pid] => command::resend(bot, state, user_id, lang, pid, None).await?,
        ["adminresend", pid, uid] => {
            if let Ok(uid) = uid.parse::<i64>() {
                command::resend(bot, state, user_id, lang, pid, Some(uid)).await?;
            }
        }
        ["delprod", pid] => {
            send_kb(
                bot,
                user_id,
                tr("delete_confirm", lang),
                delete_confirm_keyboard(pid, lang),
            )
            .await;
        }
        ["delprod", pid, "confirm"] => {
            if state.products.get(pid).await?.is_none() {
                send(bot, user_id, tr("product_not_found", lang)).await;
            } else {
                state.products.delete(pid).await?;
                send(bot, user_id, tr("product_deleted", lang)).await;
            }
        }
        ["adminstats", pid] => product_stats(bot, state, user_id, lang, pid).await?,
        _ => {
            // Stale or unknown button, nothing to do.
        }
    }
    Ok(())
}

/// Record the buy intent and alert the admin. A user with an unresolved
/// pending purchase is turned away instead of silently replacing it.
async fn buy(bot: &Bot, state: &AppState, user_id: i64, lang: &str, product_id: &str) -> Result<()> {
    if state.products.get(product_id).await?.is_none() {
        send(bot, user_id, tr("product_not_found", lang)).await;
        return Ok(());
    }
    if state.pending.find_by_user(user_id).await?.is_some() {
        send(bot, user_id, tr("buy_already_pending", lang)).await;
        return Ok(());
    }
    state.pending.add(user_id, product_id).await?;
    send(bot, user_id, tr("buy_recorded", lang)).await;

    let admin_lang = user_lang(state, state.admin_id).await;
    let text = format!("🛒 user {user_id} wants to buy {product_id}");
    send_kb(
        bot,
        state.admin_id,
        &text,
        crate::bot::keyboards::pending_keyboard(user_id, product_id, &admin_lang),
    )
    .await;
    Ok(())
}

async fn manage_list(bot: &Bot, state: &AppState, chat_id: i64, lang: &str) -> Result<()> {
    let products = state.products.list().await?;
    if products.is_empty() {
        send(bot, chat_id, tr("no_products", lang)).await;
        return Ok(());
    }
    for (id, product) in &products {
        send_kb(
            bot,
            chat_id,
            &crate::bot::utils::product_line(id, product),
            manage_product_keyboard(id),
        )
        .await;
    }
    Ok(())
}

/// Buyer list with a remove button per buyer.
async fn buyer_list(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    product_id: &str,
) -> Result<()> {
    let Some(product) = state.products.get(product_id).await? else {
        send(bot, chat_id, tr("product_not_found", lang)).await;
        return Ok(());
    };
    if product.buyers.is_empty() {
        send(bot, chat_id, tr("buyers_none", lang)).await;
        return Ok(());
    }
    let buttons: Vec<Vec<InlineKeyboardButton>> = product
        .buyers
        .iter()
        .map(|uid| {
            vec![InlineKeyboardButton::callback(
                format!("🗑 {uid}"),
                format!("admin:deletebuyer:{product_id}:{uid}"),
            )]
        })
        .collect();
    let text = format!("{} {}", tr("buyers_header", lang), product_id);
    send_kb(bot, chat_id, &text, InlineKeyboardMarkup::new(buttons)).await;
    Ok(())
}

async fn product_stats(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    product_id: &str,
) -> Result<()> {
    let Some(product) = state.products.get(product_id).await? else {
        send(bot, chat_id, tr("product_not_found", lang)).await;
        return Ok(());
    };
    let pending_for_product = state
        .pending
        .list()
        .await?
        .into_iter()
        .filter(|row| row.product_id == product_id)
        .count();
    let text = format!(
        "📊 {}\nPrice: {}\nBuyers: {}\nPending: {}",
        product.name.as_deref().unwrap_or(product_id),
        product.price,
        product.buyers.len(),
        pending_for_product,
    );
    send(bot, chat_id, &text).await;
    Ok(())
}
