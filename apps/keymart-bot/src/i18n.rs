//! Static message table. English is complete; Farsi covers the
//! customer-facing keys and falls back to English for the rest.

pub const SUPPORTED_LANGS: [&str; 2] = ["en", "fa"];

pub fn is_supported(lang: &str) -> bool {
    SUPPORTED_LANGS.contains(&lang)
}

/// Look up a message by key. Unknown keys echo back, which makes a missing
/// entry visible in chat instead of panicking.
pub fn tr(key: &'static str, lang: &str) -> &'static str {
    if lang == "fa" {
        if let Some(text) = fa(key) {
            return text;
        }
    }
    en(key)
}

fn en(key: &'static str) -> &'static str {
    match key {
        "welcome" => "👋 Welcome! Browse /products to see what's available, or use the menu below.",
        "help" => "Commands:\n/products — list products\n/code — get a login code for a purchase\n/contact — contact the seller\n/setlang — change language",
        "help_admin" => "\nAdmin:\n/addproduct /editproduct /deleteproduct\n/pending /approve /reject\n/buyers /deletebuyer /clearbuyers /resend /stats",
        "contact" => "📞 Contact the seller:",
        "no_products" => "No products available right now.",
        "products_header" => "🛍 Available products:",
        "product_not_found" => "❌ Product not found.",
        "unauthorized" => "⛔ You are not allowed to do that.",
        "unsupported_language" => "❌ Unsupported language. Available: en, fa",
        "language_set" => "✅ Language updated.",
        "choose_language" => "🌐 Choose your language:",
        "buy_recorded" => "🧾 Purchase request recorded. Send a screenshot of your payment here and wait for approval.",
        "buy_already_pending" => "⏳ You already have a purchase awaiting approval. Finish that one first.",
        "pending_none" => "No pending purchases.",
        "pending_header" => "⏳ Pending purchases:",
        "pending_mismatch" => "❌ That user has no pending purchase for that product.",
        "approved_user" => "✅ Your purchase was approved! Your credentials:",
        "approved_admin" => "✅ Approved and credentials delivered.",
        "rejected_user" => "❌ Your purchase request was rejected.",
        "rejected_admin" => "Rejected and removed from the pending list.",
        "code_denied" => "⛔ Only buyers of this product can request a code.",
        "code_empty_secret" => "❌ This product has no code secret configured.",
        "code_failed" => "❌ Could not generate a code; the stored secret looks invalid.",
        "your_code" => "🔑 Your one-time code:",
        "prompt_id" => "Send the new product id:",
        "prompt_price" => "Send the price:",
        "prompt_username" => "Send the account username:",
        "prompt_password" => "Send the account password:",
        "prompt_secret" => "Send the code secret (base32), or - for none:",
        "prompt_name" => "Send a display name, or - for none:",
        "product_exists" => "❌ A product with that id already exists. Nothing was saved.",
        "product_added" => "✅ Product saved.",
        "product_deleted" => "🗑 Product deleted.",
        "delete_confirm" => "Really delete this product?",
        "edit_prompt" => "Send the new value:",
        "edit_invalid_field" => "❌ That field cannot be edited. Editable: price, username, password, secret, name.",
        "edit_updated" => "✅ Field updated.",
        "edit_pick_field" => "Which field do you want to edit?",
        "buyers_none" => "This product has no buyers.",
        "buyers_header" => "👥 Buyers:",
        "buyers_cleared" => "🧹 Buyer list cleared.",
        "buyer_deleted" => "✅ Buyer removed.",
        "resent" => "📨 Credentials resent.",
        "photo_no_pending" => "I received your photo, but you have no purchase awaiting approval.",
        "proof_forwarded" => "📸 Screenshot received. You'll be notified once it's reviewed.",
        "credentials_intro" => "Your account details:",
        "menu_products" => "🛍 Products",
        "menu_contact" => "📞 Contact",
        "menu_help" => "❓ Help",
        "menu_language" => "🌐 Language",
        "btn_buy" => "💳 Buy",
        "btn_code" => "🔑 Get code",
        "btn_back" => "⬅️ Back",
        "btn_approve" => "✅ Approve",
        "btn_reject" => "❌ Reject",
        "btn_confirm_delete" => "🗑 Yes, delete",
        other => other,
    }
}

fn fa(key: &str) -> Option<&'static str> {
    Some(match key {
        "welcome" => "👋 خوش آمدید! برای دیدن محصولات /products را بزنید.",
        "no_products" => "فعلاً محصولی موجود نیست.",
        "products_header" => "🛍 محصولات موجود:",
        "product_not_found" => "❌ محصول پیدا نشد.",
        "unauthorized" => "⛔ اجازه این کار را ندارید.",
        "unsupported_language" => "❌ زبان پشتیبانی نمی‌شود. موجود: en, fa",
        "language_set" => "✅ زبان تغییر کرد.",
        "choose_language" => "🌐 زبان خود را انتخاب کنید:",
        "buy_recorded" => "🧾 درخواست خرید ثبت شد. اسکرین‌شات پرداخت را همین‌جا بفرستید و منتظر تأیید بمانید.",
        "buy_already_pending" => "⏳ یک خرید در انتظار تأیید دارید. ابتدا آن را تمام کنید.",
        "approved_user" => "✅ خرید شما تأیید شد! اطلاعات حساب:",
        "rejected_user" => "❌ درخواست خرید شما رد شد.",
        "code_denied" => "⛔ فقط خریداران این محصول می‌توانند کد بگیرند.",
        "code_empty_secret" => "❌ برای این محصول رمز کد تنظیم نشده است.",
        "your_code" => "🔑 کد یک‌بارمصرف شما:",
        "photo_no_pending" => "عکس دریافت شد، اما خرید در انتظاری ندارید.",
        "proof_forwarded" => "📸 اسکرین‌شات دریافت شد. بعد از بررسی خبر داده می‌شود.",
        "credentials_intro" => "اطلاعات حساب شما:",
        "menu_products" => "🛍 محصولات",
        "menu_contact" => "📞 تماس",
        "menu_help" => "❓ راهنما",
        "menu_language" => "🌐 زبان",
        "btn_buy" => "💳 خرید",
        "btn_code" => "🔑 دریافت کد",
        "btn_back" => "⬅️ بازگشت",
        "contact" => "📞 تماس با فروشنده:",
        _ => return None,
    })
}
