use keymart_db::models::EditableField;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::i18n::tr;

pub fn main_menu(lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(tr("menu_products", lang), "menu:products"),
            InlineKeyboardButton::callback(tr("menu_contact", lang), "menu:contact"),
        ],
        vec![
            InlineKeyboardButton::callback(tr("menu_help", lang), "menu:help"),
            InlineKeyboardButton::callback(tr("menu_language", lang), "menu:language"),
        ],
    ])
}

pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🇺🇸 English", "language:en"),
        InlineKeyboardButton::callback("🇮🇷 فارسی", "language:fa"),
    ]])
}

pub fn product_keyboard(product_id: &str, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        tr("btn_buy", lang),
        format!("buy:{product_id}"),
    )]])
}

/// Attached to delivered credentials so the buyer can pull fresh codes.
pub fn code_keyboard(product_id: &str, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        tr("btn_code", lang),
        format!("code:{product_id}"),
    )]])
}

pub fn pending_keyboard(user_id: i64, product_id: &str, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            tr("btn_approve", lang),
            format!("admin:approve:{user_id}:{product_id}"),
        ),
        InlineKeyboardButton::callback(
            tr("btn_reject", lang),
            format!("admin:reject:{user_id}:{product_id}"),
        ),
    ]])
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("⏳ Pending", "adminmenu:pending"),
            InlineKeyboardButton::callback("🛠 Manage", "adminmenu:manage"),
        ],
        vec![
            InlineKeyboardButton::callback("➕ Add product", "adminmenu:addproduct"),
            InlineKeyboardButton::callback("📊 Stats", "adminmenu:stats"),
        ],
    ])
}

pub fn manage_product_keyboard(product_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✏️ Edit", format!("editprod:{product_id}")),
            InlineKeyboardButton::callback("🗑 Delete", format!("delprod:{product_id}")),
        ],
        vec![
            InlineKeyboardButton::callback("👥 Buyers", format!("buyerlist:{product_id}")),
            InlineKeyboardButton::callback("📊 Stats", format!("adminstats:{product_id}")),
        ],
        vec![
            InlineKeyboardButton::callback("📨 Resend", format!("adminresend:{product_id}")),
            InlineKeyboardButton::callback("🧹 Clear buyers", format!("adminclearbuyers:{product_id}")),
        ],
    ])
}

pub fn edit_fields_keyboard(product_id: &str) -> InlineKeyboardMarkup {
    let row = EditableField::ALL
        .iter()
        .map(|f| {
            InlineKeyboardButton::callback(
                f.as_str().to_string(),
                format!("editfield:{product_id}:{}", f.as_str()),
            )
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

pub fn delete_confirm_keyboard(product_id: &str, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            tr("btn_confirm_delete", lang),
            format!("delprod:{product_id}:confirm"),
        ),
        InlineKeyboardButton::callback(tr("btn_back", lang), "adminmenu:manage"),
    ]])
}
