//! Chat session domain model.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// One chat conversation thread, optionally tied to an uploaded document.
///
/// Field names serialize in camelCase to match the persisted slot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Display name
    pub title: String,
    /// Messages in chronological order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Name of the associated uploaded document, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: i64,
    /// Last mutation time in milliseconds since the Unix epoch
    pub updated_at: i64,
}

impl ChatSession {
    /// The most recently appended message.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Largest timestamp held by this session.
    pub(crate) fn latest_timestamp(&self) -> i64 {
        self.messages
            .iter()
            .map(|m| m.timestamp)
            .chain([self.created_at, self.updated_at])
            .max()
            .unwrap_or(self.updated_at)
    }
}

/// The persisted portion of the chat store.
///
/// `isLoading` and `error` are transient and intentionally absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChatState {
    /// Sessions, newest-created first
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    /// ID of the current session
    #[serde(default)]
    pub current_session_id: Option<String>,
}
