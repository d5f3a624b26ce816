//! Drives the multi-step conversation flows over the dialog and product
//! repositories. Handlers map the returned outcome to a reply; nothing here
//! talks to the chat platform.

use anyhow::Result;

use crate::models::{AddStep, ConversationState, EditableField, Product};
use crate::repositories::{DialogRepository, PendingRepository, ProductRepository};
use crate::totp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Value accepted; ask for the named step next.
    Prompt(AddStep),
    /// Flow finished and the product was written.
    Committed(String),
    /// Flow finished but a product with that id already exists; nothing
    /// was written.
    Duplicate(String),
    /// The user has no active add flow.
    NotActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// Ledger row removed and the buyer recorded; the product is returned
    /// so the caller can deliver the credentials.
    Approved(Product),
    /// No pending row for this user, or it names a different product.
    /// Nothing was changed.
    Mismatch,
    /// The ledger matched but the product row is gone; ledger untouched.
    ProductNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectOutcome {
    Rejected,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    Code(String),
    NotBuyer,
    EmptySecret,
    InvalidSecret,
    ProductNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated { product_id: String, field: EditableField },
    InvalidField(String),
    ProductNotFound(String),
    /// The user has no active edit flow.
    NotActive,
}

/// Consume one text message for an active add flow: assign it to the field
/// named by the current step, then advance. Reaching the last step attempts
/// the commit and removes the flow whatever the outcome.
pub async fn advance_add(
    dialogs: &DialogRepository,
    products: &ProductRepository,
    user_id: i64,
    text: &str,
) -> Result<AddOutcome> {
    let Some(ConversationState::AddingProduct(mut flow)) = dialogs.state(user_id).await? else {
        return Ok(AddOutcome::NotActive);
    };

    match flow.step {
        AddStep::Id => {
            flow.draft.pid = Some(text.to_string());
            flow.step = AddStep::Price;
        }
        AddStep::Price => {
            flow.draft.price = Some(text.to_string());
            flow.step = AddStep::Username;
        }
        AddStep::Username => {
            flow.draft.username = Some(text.to_string());
            flow.step = AddStep::Password;
        }
        AddStep::Password => {
            flow.draft.password = Some(text.to_string());
            flow.step = AddStep::Secret;
        }
        AddStep::Secret => {
            // "-" means no code secret.
            let secret = if text == "-" { String::new() } else { text.to_string() };
            flow.draft.secret = Some(secret);
            flow.step = AddStep::Name;
        }
        AddStep::Name => {
            // "-" means no display name.
            let name = (text != "-" && !text.is_empty()).then(|| text.to_string());
            let pid = flow.draft.pid.clone().unwrap_or_default();
            let outcome = if products.get(&pid).await?.is_some() {
                AddOutcome::Duplicate(pid)
            } else {
                let product = Product {
                    price: flow.draft.price.unwrap_or_default(),
                    username: flow.draft.username.unwrap_or_default(),
                    password: flow.draft.password.unwrap_or_default(),
                    secret: flow.draft.secret.unwrap_or_default(),
                    name,
                    buyers: Vec::new(),
                };
                products.upsert(&pid, &product).await?;
                AddOutcome::Committed(pid)
            };
            dialogs.clear(user_id).await?;
            return Ok(outcome);
        }
    }

    dialogs.save_add(user_id, &flow).await?;
    Ok(AddOutcome::Prompt(flow.step))
}

/// Confirm a purchase only when the ledger row matches the named product
/// exactly. On a match the row is removed and the buyer recorded before
/// this returns, so message delivery failures afterwards cannot undo the
/// sale. Any mismatch leaves both the ledger and the buyer set untouched.
pub async fn approve_purchase(
    pending: &PendingRepository,
    products: &ProductRepository,
    user_id: i64,
    product_id: &str,
) -> Result<ApproveOutcome> {
    match pending.find_by_user(user_id).await? {
        Some(row) if row.product_id == product_id => {
            let Some(product) = products.get(product_id).await? else {
                return Ok(ApproveOutcome::ProductNotFound(product_id.to_string()));
            };
            pending.remove(user_id, product_id).await?;
            products.add_buyer(product_id, user_id).await?;
            Ok(ApproveOutcome::Approved(product))
        }
        _ => Ok(ApproveOutcome::Mismatch),
    }
}

/// Same ledger check as [`approve_purchase`], but only removes the row.
pub async fn reject_purchase(
    pending: &PendingRepository,
    user_id: i64,
    product_id: &str,
) -> Result<RejectOutcome> {
    match pending.find_by_user(user_id).await? {
        Some(row) if row.product_id == product_id => {
            pending.remove(user_id, product_id).await?;
            Ok(RejectOutcome::Rejected)
        }
        _ => Ok(RejectOutcome::Mismatch),
    }
}

/// One-time code for a purchased product. Only recorded buyers qualify
/// unless `bypass_buyer_check` is set (the admin path); a missing secret is
/// an explicit failure, never a blank code.
pub async fn request_code(
    products: &ProductRepository,
    user_id: i64,
    product_id: &str,
    bypass_buyer_check: bool,
) -> Result<CodeOutcome> {
    let Some(product) = products.get(product_id).await? else {
        return Ok(CodeOutcome::ProductNotFound(product_id.to_string()));
    };
    if !bypass_buyer_check && !product.buyers.contains(&user_id) {
        return Ok(CodeOutcome::NotBuyer);
    }
    if product.secret.trim().is_empty() {
        return Ok(CodeOutcome::EmptySecret);
    }
    match totp::generate(&product.secret) {
        Ok(code) => Ok(CodeOutcome::Code(code)),
        Err(_) => Ok(CodeOutcome::InvalidSecret),
    }
}

/// Consume the single value message of an edit flow. The flow state is
/// removed on every outcome, success or failure, so the next message from
/// the user is ordinary input again.
pub async fn apply_edit(
    dialogs: &DialogRepository,
    products: &ProductRepository,
    user_id: i64,
    value: &str,
) -> Result<EditOutcome> {
    let Some(ConversationState::EditingField(flow)) = dialogs.state(user_id).await? else {
        return Ok(EditOutcome::NotActive);
    };

    let outcome = match flow.field.parse::<EditableField>() {
        Err(_) => EditOutcome::InvalidField(flow.field.clone()),
        Ok(field) => {
            if products.get(&flow.product_id).await?.is_none() {
                EditOutcome::ProductNotFound(flow.product_id.clone())
            } else {
                products.update_field(&flow.product_id, field, value).await?;
                EditOutcome::Updated {
                    product_id: flow.product_id.clone(),
                    field,
                }
            }
        }
    };
    dialogs.clear(user_id).await?;
    Ok(outcome)
}
