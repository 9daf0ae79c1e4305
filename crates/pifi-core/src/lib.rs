//! Core domain of the PiFi client state layer.
//!
//! Contains the chat session store, the user preference store, the
//! key-value storage contract and the persistence writer shared by both
//! stores. Storage adapters, configuration and the backend client live in
//! sibling crates.

pub mod chat;
pub mod clock;
pub mod document;
pub mod error;
pub mod persist;
pub mod storage;
pub mod user;

// Re-export common types
pub use chat::{ChatSession, ChatStore, Message, MessageRole, NewMessage};
pub use error::PifiError;
pub use storage::KeyValueStorage;
