pub mod conversation;
pub mod store;

pub use conversation::{Conversation, ConversationSummary, Message, Role};
pub use store::ConversationStore;
