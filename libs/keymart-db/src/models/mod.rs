pub mod dialog;
pub mod store;

pub use dialog::{AddDraft, AddFlow, AddStep, ConversationState, EditFlow};
pub use store::{EditableField, InvalidField, PendingPurchase, Product, Snapshot};
