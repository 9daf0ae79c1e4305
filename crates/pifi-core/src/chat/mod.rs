//! Chat domain module.
//!
//! # Module Structure
//!
//! - `message`: Message types (`MessageRole`, `Message`, `NewMessage`)
//! - `model`: Session model and the persisted record (`ChatSession`, `PersistedChatState`)
//! - `store`: The session store (`ChatStore`)
//! - `responder`: Assistant collaborator trait (`AssistantResponder`)

mod message;
mod model;
mod responder;
mod store;

// Re-export public API
pub use message::{Message, MessageRole, NewMessage};
pub use model::{ChatSession, PersistedChatState};
pub use responder::AssistantResponder;
pub use store::{CHAT_STORAGE_KEY, ChatStore};
