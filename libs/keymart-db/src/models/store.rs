use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::dialog::{AddFlow, EditFlow};

/// A digital product, keyed externally by a merchant-chosen string id.
/// Credential fields are plaintext in memory and encrypted at rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub price: String,
    pub username: String,
    pub password: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub buyers: Vec<i64>,
}

impl Product {
    /// Buyer sets are order-irrelevant and deduplicated.
    pub fn normalized_buyers(&self) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.buyers.len());
        for &uid in &self.buyers {
            if !out.contains(&uid) {
                out.push(uid);
            }
        }
        out
    }
}

/// An unconfirmed buy intent awaiting admin approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub user_id: i64,
    pub product_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("field {0:?} cannot be edited")]
pub struct InvalidField(pub String);

/// Closed set of editable product fields. Parsing rejects anything else, so
/// unknown field names never reach the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditableField {
    Price,
    Username,
    Password,
    Secret,
    Name,
}

impl EditableField {
    pub const ALL: [EditableField; 5] = [
        EditableField::Price,
        EditableField::Username,
        EditableField::Password,
        EditableField::Secret,
        EditableField::Name,
    ];

    /// Credential fields are encrypted before they are written.
    pub fn is_credential(self) -> bool {
        matches!(
            self,
            EditableField::Username | EditableField::Password | EditableField::Secret
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditableField::Price => "price",
            EditableField::Username => "username",
            EditableField::Password => "password",
            EditableField::Secret => "secret",
            EditableField::Name => "name",
        }
    }
}

impl FromStr for EditableField {
    type Err = InvalidField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(EditableField::Price),
            "username" => Ok(EditableField::Username),
            "password" => Ok(EditableField::Password),
            "secret" => Ok(EditableField::Secret),
            "name" => Ok(EditableField::Name),
            other => Err(InvalidField(other.to_string())),
        }
    }
}

/// Whole-state copy used by the reconciling bulk sync: the five keyed
/// collections, with product credentials decrypted (tolerantly) in transit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub products: BTreeMap<String, Product>,
    #[serde(default)]
    pub pending: Vec<PendingPurchase>,
    #[serde(default)]
    pub add_states: BTreeMap<i64, AddFlow>,
    #[serde(default)]
    pub edit_states: BTreeMap<i64, EditFlow>,
    #[serde(default)]
    pub languages: BTreeMap<i64, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_field_rejects_unknown_names() {
        assert!("price".parse::<EditableField>().is_ok());
        assert_eq!(
            "buyers".parse::<EditableField>(),
            Err(InvalidField("buyers".to_string()))
        );
        assert!("id".parse::<EditableField>().is_err());
        assert!("Price".parse::<EditableField>().is_err());
    }

    #[test]
    fn credential_flags() {
        assert!(EditableField::Username.is_credential());
        assert!(EditableField::Password.is_credential());
        assert!(EditableField::Secret.is_credential());
        assert!(!EditableField::Price.is_credential());
        assert!(!EditableField::Name.is_credential());
    }

    #[test]
    fn buyers_normalize_preserves_order_and_dedupes() {
        let product = Product {
            buyers: vec![7, 2, 7, 9, 2],
            ..Default::default()
        };
        assert_eq!(product.normalized_buyers(), vec![7, 2, 9]);
    }
}
