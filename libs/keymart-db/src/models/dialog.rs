use serde::{Deserialize, Serialize};

/// Steps of the add-product flow, in the order the bot asks for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddStep {
    Id,
    Price,
    Username,
    Password,
    Secret,
    Name,
}

impl AddStep {
    pub fn as_str(self) -> &'static str {
        match self {
            AddStep::Id => "id",
            AddStep::Price => "price",
            AddStep::Username => "username",
            AddStep::Password => "password",
            AddStep::Secret => "secret",
            AddStep::Name => "name",
        }
    }

    pub fn parse(s: &str) -> Option<AddStep> {
        match s {
            "id" => Some(AddStep::Id),
            "price" => Some(AddStep::Price),
            "username" => Some(AddStep::Username),
            "password" => Some(AddStep::Password),
            "secret" => Some(AddStep::Secret),
            "name" => Some(AddStep::Name),
            _ => None,
        }
    }
}

/// Partial product accumulated while an add flow is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFlow {
    pub step: AddStep,
    #[serde(default)]
    pub draft: AddDraft,
}

impl Default for AddStep {
    fn default() -> Self {
        AddStep::Id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFlow {
    pub product_id: String,
    /// Raw field name as selected; validated against [`super::EditableField`]
    /// only when the value is submitted, like the command-line edit path.
    pub field: String,
}

/// Per-user conversation state. One row per user backs this, so a user is in
/// at most one flow at a time by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    AddingProduct(AddFlow),
    EditingField(EditFlow),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_order_roundtrips_through_names() {
        let order = [
            AddStep::Id,
            AddStep::Price,
            AddStep::Username,
            AddStep::Password,
            AddStep::Secret,
            AddStep::Name,
        ];
        for step in order {
            assert_eq!(AddStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(AddStep::parse("buyers"), None);
    }
}
