use anyhow::Result;
use keymart_db::flows::{self, AddOutcome, ApproveOutcome, CodeOutcome, EditOutcome, RejectOutcome};
use keymart_db::models::{AddStep, Product};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{error, info, warn};

use crate::bot::keyboards::{
    admin_menu, edit_fields_keyboard, language_keyboard, main_menu, pending_keyboard,
};
use crate::bot::utils::{format_credentials, product_line, send, send_kb, user_lang};
use crate::i18n::{is_supported, tr};
use crate::state::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id.0;
    let lang = user_lang(&state, chat_id).await;

    if msg.photo().is_some() {
        handle_photo(&bot, &msg, &state, &lang).await;
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let text = text.trim();

    let result = if let Some(rest) = text.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        // Group chats append @botname to commands.
        let cmd = cmd.split('@').next().unwrap_or(cmd);
        let args: Vec<&str> = parts.collect();
        info!("command /{} from {}", cmd, chat_id);
        dispatch_command(&bot, &state, chat_id, &lang, cmd, &args).await
    } else {
        continue_flow(&bot, &state, chat_id, &lang, text).await
    };

    if let Err(e) = result {
        error!("message from {} failed: {:#}", chat_id, e);
        send(&bot, chat_id, "⚠️ Something went wrong, please try again.").await;
    }
    Ok(())
}

async fn dispatch_command(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    cmd: &str,
    args: &[&str],
) -> Result<()> {
    match cmd {
        "start" => {
            send_kb(bot, chat_id, tr("welcome", lang), main_menu(lang)).await;
            if state.is_admin(chat_id) {
                send_kb(bot, chat_id, "🛠 Admin menu:", admin_menu()).await;
            }
        }
        "help" => {
            let mut text = tr("help", lang).to_string();
            if state.is_admin(chat_id) {
                text.push_str(tr("help_admin", lang));
            }
            send(bot, chat_id, &text).await;
        }
        "contact" => {
            let text = format!("{} {}", tr("contact", lang), state.admin_phone);
            send(bot, chat_id, &text).await;
        }
        "products" => send_product_list(bot, state, chat_id, lang).await?,
        "setlang" => match args.first() {
            None => send_kb(bot, chat_id, tr("choose_language", lang), language_keyboard()).await,
            Some(code) => set_language(bot, state, chat_id, lang, code).await?,
        },
        "code" => match args.first() {
            Some(pid) => send_code(bot, state, chat_id, lang, pid).await?,
            None => send(bot, chat_id, "Usage: /code <product id>").await,
        },

        // Everything below is admin-only.
        "addproduct" | "pending" | "approve" | "reject" | "editproduct" | "deleteproduct"
        | "buyers" | "deletebuyer" | "clearbuyers" | "resend" | "stats"
            if !state.is_admin(chat_id) =>
        {
            send(bot, chat_id, tr("unauthorized", lang)).await;
        }
        "addproduct" => {
            if args.len() >= 5 {
                // One-shot form: id price username password secret [name...]
                let pid = args[0];
                if state.products.get(pid).await?.is_some() {
                    send(bot, chat_id, tr("product_exists", lang)).await;
                } else {
                    let name = if args.len() > 5 {
                        Some(args[5..].join(" "))
                    } else {
                        None
                    };
                    let product = Product {
                        price: args[1].to_string(),
                        username: args[2].to_string(),
                        password: args[3].to_string(),
                        secret: args[4].to_string(),
                        name,
                        buyers: Vec::new(),
                    };
                    state.products.upsert(pid, &product).await?;
                    send(bot, chat_id, tr("product_added", lang)).await;
                }
            } else {
                state.dialogs.start_add(chat_id).await?;
                send(bot, chat_id, tr("prompt_id", lang)).await;
            }
        }
        "pending" => send_pending_list(bot, state, chat_id, lang).await?,
        "approve" => match parse_user_product(args) {
            Some((uid, pid)) => approve(bot, state, chat_id, lang, uid, pid).await?,
            None => send(bot, chat_id, "Usage: /approve <user id> <product id>").await,
        },
        "reject" => match parse_user_product(args) {
            Some((uid, pid)) => reject(bot, state, chat_id, lang, uid, pid).await?,
            None => send(bot, chat_id, "Usage: /reject <user id> <product id>").await,
        },
        "editproduct" => match args {
            [pid, field] => {
                if state.products.get(pid).await?.is_none() {
                    send(bot, chat_id, tr("product_not_found", lang)).await;
                } else {
                    state.dialogs.start_edit(chat_id, pid, field).await?;
                    send(bot, chat_id, tr("edit_prompt", lang)).await;
                }
            }
            [pid] => {
                send_kb(bot, chat_id, tr("edit_pick_field", lang), edit_fields_keyboard(pid)).await;
            }
            _ => send(bot, chat_id, "Usage: /editproduct <product id> [field]").await,
        },
        "deleteproduct" => match args.first() {
            Some(pid) => {
                if state.products.get(pid).await?.is_none() {
                    send(bot, chat_id, tr("product_not_found", lang)).await;
                } else {
                    state.products.delete(pid).await?;
                    send(bot, chat_id, tr("product_deleted", lang)).await;
                }
            }
            None => send(bot, chat_id, "Usage: /deleteproduct <product id>").await,
        },
        "buyers" => match args.first() {
            Some(pid) => send_buyer_list(bot, state, chat_id, lang, pid).await?,
            None => send(bot, chat_id, "Usage: /buyers <product id>").await,
        },
        "deletebuyer" => match args {
            [pid, uid] => match uid.parse::<i64>() {
                Ok(uid) => {
                    state.products.remove_buyer(pid, uid).await?;
                    send(bot, chat_id, tr("buyer_deleted", lang)).await;
                }
                Err(_) => send(bot, chat_id, "Usage: /deletebuyer <product id> <user id>").await,
            },
            _ => send(bot, chat_id, "Usage: /deletebuyer <product id> <user id>").await,
        },
        "clearbuyers" => match args.first() {
            Some(pid) => {
                state.products.clear_buyers(pid).await?;
                send(bot, chat_id, tr("buyers_cleared", lang)).await;
            }
            None => send(bot, chat_id, "Usage: /clearbuyers <product id>").await,
        },
        "resend" => match args {
            [pid] => resend(bot, state, chat_id, lang, pid, None).await?,
            [pid, uid] => match uid.parse::<i64>() {
                Ok(uid) => resend(bot, state, chat_id, lang, pid, Some(uid)).await?,
                Err(_) => send(bot, chat_id, "Usage: /resend <product id> [user id]").await,
            },
            _ => send(bot, chat_id, "Usage: /resend <product id> [user id]").await,
        },
        "stats" => send_stats(bot, state, chat_id).await?,
        _ => {
            // Unknown command, stay quiet.
        }
    }
    Ok(())
}

fn parse_user_product<'a>(args: &[&'a str]) -> Option<(i64, &'a str)> {
    match args {
        [uid, pid] => uid.parse::<i64>().ok().map(|uid| (uid, *pid)),
        _ => None,
    }
}

/// Non-command text only matters while a conversation flow is active.
async fn continue_flow(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    text: &str,
) -> Result<()> {
    match flows::advance_add(&state.dialogs, &state.products, chat_id, text).await? {
        AddOutcome::Prompt(step) => {
            send(bot, chat_id, tr(prompt_key(step), lang)).await;
            return Ok(());
        }
        AddOutcome::Committed(_) => {
            send(bot, chat_id, tr("product_added", lang)).await;
            return Ok(());
        }
        AddOutcome::Duplicate(_) => {
            send(bot, chat_id, tr("product_exists", lang)).await;
            return Ok(());
        }
        AddOutcome::NotActive => {}
    }

    match flows::apply_edit(&state.dialogs, &state.products, chat_id, text).await? {
        EditOutcome::Updated { .. } => send(bot, chat_id, tr("edit_updated", lang)).await,
        EditOutcome::InvalidField(_) => send(bot, chat_id, tr("edit_invalid_field", lang)).await,
        EditOutcome::ProductNotFound(_) => send(bot, chat_id, tr("product_not_found", lang)).await,
        EditOutcome::NotActive => {
            // Plain chatter outside any flow is ignored.
        }
    }
    Ok(())
}

fn prompt_key(step: AddStep) -> &'static str {
    match step {
        AddStep::Id => "prompt_id",
        AddStep::Price => "prompt_price",
        AddStep::Username => "prompt_username",
        AddStep::Password => "prompt_password",
        AddStep::Secret => "prompt_secret",
        AddStep::Name => "prompt_name",
    }
}

pub(crate) async fn send_pending_list(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
) -> Result<()> {
    let rows = state.pending.list().await?;
    if rows.is_empty() {
        send(bot, chat_id, tr("pending_none", lang)).await;
        return Ok(());
    }
    send(bot, chat_id, tr("pending_header", lang)).await;
    for row in rows {
        let text = format!("user {} → {}", row.user_id, row.product_id);
        send_kb(
            bot,
            chat_id,
            &text,
            pending_keyboard(row.user_id, &row.product_id, lang),
        )
        .await;
    }
    Ok(())
}

pub(crate) async fn send_product_list(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
) -> Result<()> {
    let products = state.products.list().await?;
    if products.is_empty() {
        send(bot, chat_id, tr("no_products", lang)).await;
        return Ok(());
    }
    send(bot, chat_id, tr("products_header", lang)).await;
    for (id, product) in &products {
        send_kb(
            bot,
            chat_id,
            &product_line(id, product),
            crate::bot::keyboards::product_keyboard(id, lang),
        )
        .await;
    }
    Ok(())
}

pub(crate) async fn set_language(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    code: &str,
) -> Result<()> {
    if !is_supported(code) {
        send(bot, chat_id, tr("unsupported_language", lang)).await;
        return Ok(());
    }
    state.languages.set(chat_id, code).await?;
    send(bot, chat_id, tr("language_set", code)).await;
    Ok(())
}

pub(crate) async fn approve(
    bot: &Bot,
    state: &AppState,
    admin_chat: i64,
    lang: &str,
    user_id: i64,
    product_id: &str,
) -> Result<()> {
    match flows::approve_purchase(&state.pending, &state.products, user_id, product_id).await? {
        ApproveOutcome::Approved(product) => {
            let buyer_lang = user_lang(state, user_id).await;
            let text = format_credentials(tr("approved_user", &buyer_lang), product_id, &product);
            send_kb(
                bot,
                user_id,
                &text,
                crate::bot::keyboards::code_keyboard(product_id, &buyer_lang),
            )
            .await;
            send(bot, admin_chat, tr("approved_admin", lang)).await;
        }
        ApproveOutcome::ProductNotFound(_) => {
            send(bot, admin_chat, tr("product_not_found", lang)).await;
        }
        ApproveOutcome::Mismatch => send(bot, admin_chat, tr("pending_mismatch", lang)).await,
    }
    Ok(())
}

pub(crate) async fn reject(
    bot: &Bot,
    state: &AppState,
    admin_chat: i64,
    lang: &str,
    user_id: i64,
    product_id: &str,
) -> Result<()> {
    match flows::reject_purchase(&state.pending, user_id, product_id).await? {
        RejectOutcome::Rejected => {
            let buyer_lang = user_lang(state, user_id).await;
            send(bot, user_id, tr("rejected_user", &buyer_lang)).await;
            send(bot, admin_chat, tr("rejected_admin", lang)).await;
        }
        RejectOutcome::Mismatch => send(bot, admin_chat, tr("pending_mismatch", lang)).await,
    }
    Ok(())
}

pub(crate) async fn send_code(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    lang: &str,
    product_id: &str,
) -> Result<()> {
    let outcome =
        flows::request_code(&state.products, chat_id, product_id, state.is_admin(chat_id)).await?;
    match outcome {
        CodeOutcome::Code(code) => {
            let text = format!("{} {}", tr("your_code", lang), code);
            send(bot, chat_id, &text).await;
        }
        CodeOutcome::NotBuyer => send(bot, chat_id, tr("code_denied", lang)).await,
        CodeOutcome::EmptySecret => send(bot, chat_id, tr("code_empty_secret", lang)).await,
        CodeOutcome::InvalidSecret => send(bot, chat_id, tr("code_failed", lang)).await,
        CodeOutcome::ProductNotFound(_) => send(bot, chat_id, tr("product_not_found", lang)).await,
    }
    Ok(())
}

pub(crate) async fn send_buyer_list(
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
    } else {
        let mut text = format!("{} {}\n", tr("buyers_header", lang), product_id);
        for uid in &product.buyers {
            text.push_str(&format!("• {uid}\n"));
        }
        send(bot, chat_id, &text).await;
    }
    Ok(())
}

/// Resend credentials to one buyer, or to every buyer when none is named.
pub(crate) async fn resend(
    bot: &Bot,
    state: &AppState,
    admin_chat: i64,
    lang: &str,
    product_id: &str,
    user_id: Option<i64>,
) -> Result<()> {
    let Some(product) = state.products.get(product_id).await? else {
        send(bot, admin_chat, tr("product_not_found", lang)).await;
        return Ok(());
    };
    let targets: Vec<i64> = match user_id {
        Some(uid) => vec![uid],
        None => product.buyers.clone(),
    };
    for uid in targets {
        let buyer_lang = user_lang(state, uid).await;
        let text = format_credentials(tr("credentials_intro", &buyer_lang), product_id, &product);
        send_kb(
            bot,
            uid,
            &text,
            crate::bot::keyboards::code_keyboard(product_id, &buyer_lang),
        )
        .await;
    }
    send(bot, admin_chat, tr("resent", lang)).await;
    Ok(())
}

pub(crate) async fn send_stats(bot: &Bot, state: &AppState, chat_id: i64) -> Result<()> {
    let products = state.products.list().await?;
    let pending = state.pending.list().await?;
    let buyer_total: usize = products.values().map(|p| p.buyers.len()).sum();
    let text = format!(
        "📊 Stats\nProducts: {}\nPending purchases: {}\nTotal buyers: {}",
        products.len(),
        pending.len(),
        buyer_total,
    );
    send(bot, chat_id, &text).await;
    Ok(())
}

/// Photo messages are treated as payment proof for the sender's pending
/// purchase. The blob is stored best-effort; a storage failure is logged
/// and the photo is still forwarded to the admin for review.
async fn handle_photo(bot: &Bot, msg: &Message, state: &AppState, lang: &str) {
    let chat_id = msg.chat.id.0;
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return;
    };

    let pending = match state.pending.find_by_user(chat_id).await {
        Ok(p) => p,
        Err(e) => {
            error!("pending lookup for {} failed: {:#}", chat_id, e);
            return;
        }
    };
    let Some(pending) = pending else {
        send(bot, chat_id, tr("photo_no_pending", lang)).await;
        return;
    };

    match bot.get_file(photo.file.id.clone()).await {
        Ok(file) => {
            let mut buf = Vec::new();
            match bot.download_file(&file.path, &mut buf).await {
                Ok(()) => {
                    if let Err(e) = state
                        .proofs
                        .insert(&photo.file.id.to_string(), chat_id, &pending.product_id, &buf)
                        .await
                    {
                        warn!("failed to store payment proof from {}: {:#}", chat_id, e);
                    }
                }
                Err(e) => warn!("failed to download payment proof from {}: {}", chat_id, e),
            }
        }
        Err(e) => warn!("get_file for proof from {} failed: {}", chat_id, e),
    }

    let caption = format!(
        "Payment proof from {} for {}\n/approve {} {}",
        chat_id, pending.product_id, chat_id, pending.product_id,
    );
    let photo_input = InputFile::file_id(photo.file.id.clone());
    if let Err(e) = bot
        .send_photo(ChatId(state.admin_id), photo_input.clone())
        .caption(caption.clone())
        .await
    {
        warn!("forwarding proof to admin failed, retrying once: {}", e);
        if let Err(e) = bot
            .send_photo(ChatId(state.admin_id), photo_input)
            .caption(caption)
            .await
        {
            error!("forwarding proof to admin failed after retry: {}", e);
        }
    }
    send(bot, chat_id, tr("proof_forwarded", lang)).await;
}
