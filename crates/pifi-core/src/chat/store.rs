//! The chat session store.
//!
//! `ChatStore` is the single source of truth for chat sessions and the
//! currently selected one. Every domain mutation updates memory first and
//! then queues a snapshot write through its [`Persister`]; the write is
//! never awaited by the mutating call.

use std::sync::Arc;

use uuid::Uuid;

use super::message::{Message, NewMessage};
use super::model::{ChatSession, PersistedChatState};
use crate::clock::{Clock, MonotonicClock, SystemClock};
use crate::error::Result;
use crate::persist::{self, FlushHandle, Persister};
use crate::storage::KeyValueStorage;

/// Storage key of the chat slot.
pub const CHAT_STORAGE_KEY: &str = "pifi-chat-storage";

/// Owns all chat sessions, the current selection and transient request status.
///
/// Operations are synchronous and infallible: unknown ids are silent no-ops.
/// Must be created inside a tokio runtime (the persistence writer is a task).
///
/// # Example
///
/// ```ignore
/// let mut store = ChatStore::load(storage).await;
/// let id = store.create_session(Some("report.pdf"));
/// store.add_message(NewMessage::user("What was revenue in 2023?"));
/// store.flush().await?;
/// ```
#[derive(Debug)]
pub struct ChatStore {
    sessions: Vec<ChatSession>,
    current_session_id: Option<String>,
    is_loading: bool,
    error: Option<String>,
    clock: MonotonicClock,
    persister: Persister,
}

impl ChatStore {
    /// Creates an empty store persisting to `storage`.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Creates an empty store with a custom time source.
    pub fn with_clock(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(PersistedChatState::default(), storage, clock)
    }

    /// Rehydrates the store from its slot.
    ///
    /// An empty slot yields an empty store. An unreadable or corrupt slot is
    /// logged and also yields an empty store; the next mutation overwrites it.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::load_with_clock(storage, Arc::new(SystemClock)).await
    }

    /// Rehydrates the store with a custom time source.
    pub async fn load_with_clock(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        let state = match persist::rehydrate::<PersistedChatState>(storage.as_ref(), CHAT_STORAGE_KEY).await {
            Ok(Some(state)) => {
                tracing::info!(sessions = state.sessions.len(), "Rehydrated chat sessions");
                state
            }
            Ok(None) => {
                tracing::debug!("No persisted chat state; starting empty");
                PersistedChatState::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to rehydrate chat state; starting empty");
                PersistedChatState::default()
            }
        };
        Self::from_state(state, storage, clock)
    }

    fn from_state(
        state: PersistedChatState,
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut clock = MonotonicClock::new(clock);
        for session in &state.sessions {
            clock.observe(session.latest_timestamp());
        }

        Self {
            sessions: state.sessions,
            current_session_id: state.current_session_id,
            is_loading: false,
            error: None,
            clock,
            persister: Persister::spawn(storage, CHAT_STORAGE_KEY),
        }
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// All sessions, newest-created first.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Looks up a session by id.
    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// The selected session id. May dangle, see [`ChatStore::set_current_session`].
    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    /// The session matching the current id, or `None`.
    pub fn current_session(&self) -> Option<&ChatSession> {
        let id = self.current_session_id.as_deref()?;
        self.session(id)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Copy of the persisted portion of the state.
    pub fn snapshot(&self) -> PersistedChatState {
        PersistedChatState {
            sessions: self.sessions.clone(),
            current_session_id: self.current_session_id.clone(),
        }
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    /// Creates a session, puts it first and makes it current.
    ///
    /// The title is the document name when one is given, otherwise
    /// `"New Chat {n}"` with `n` one past the current session count.
    pub fn create_session(&mut self, document_name: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        let now = self.clock.tick();
        let document_name = document_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let title = document_name
            .clone()
            .unwrap_or_else(|| format!("New Chat {}", self.sessions.len() + 1));

        tracing::debug!(session_id = %id, title = %title, "Creating chat session");

        self.sessions.insert(
            0,
            ChatSession {
                id: id.clone(),
                title,
                messages: Vec::new(),
                document_name,
                created_at: now,
                updated_at: now,
            },
        );
        self.current_session_id = Some(id.clone());
        self.persist();

        id
    }

    /// Removes a session. Unknown ids are ignored.
    ///
    /// Deleting the current session moves the selection to the first
    /// remaining session, or clears it when none remain.
    pub fn delete_session(&mut self, id: &str) {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            tracing::debug!(session_id = %id, "Delete ignored: session not found");
            return;
        };

        self.sessions.remove(index);
        if self.current_session_id.as_deref() == Some(id) {
            self.current_session_id = self.sessions.first().map(|s| s.id.clone());
        }

        tracing::debug!(
            session_id = %id,
            current = ?self.current_session_id,
            "Deleted chat session"
        );
        self.persist();
    }

    /// Selects `id` as the current session without checking that it exists.
    ///
    /// A dangling id makes [`ChatStore::current_session`] return `None`.
    pub fn set_current_session(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.session(&id).is_none() {
            tracing::warn!(session_id = %id, "Selecting a session id that is not in the store");
        }
        self.current_session_id = Some(id);
        self.persist();
    }

    /// Changes a session's title. Unknown ids are ignored.
    pub fn rename_session(&mut self, id: &str, title: impl Into<String>) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            tracing::debug!(session_id = %id, "Rename ignored: session not found");
            return;
        };

        session.title = title.into();
        session.updated_at = self.clock.tick();
        self.persist();
    }

    // ============================================================================
    // Messages
    // ============================================================================

    /// Appends a message to the current session.
    ///
    /// Returns the stored message, or `None` (and changes nothing) when there
    /// is no current session.
    pub fn add_message(&mut self, message: NewMessage) -> Option<Message> {
        let current = self.current_session_id.clone()?;
        self.append_to(&current, message)
    }

    /// Appends a message to a specific session. Unknown ids are ignored.
    pub fn add_message_to(&mut self, session_id: &str, message: NewMessage) -> Option<Message> {
        self.append_to(session_id, message)
    }

    fn append_to(&mut self, session_id: &str, message: NewMessage) -> Option<Message> {
        let index = self.sessions.iter().position(|s| s.id == session_id)?;
        let now = self.clock.tick();
        let stored = Message {
            id: Uuid::new_v4().to_string(),
            role: message.role,
            content: message.content,
            timestamp: now,
        };

        let session = &mut self.sessions[index];
        session.messages.push(stored.clone());
        session.updated_at = now;

        tracing::debug!(
            session_id = %session_id,
            role = %stored.role,
            messages = session.messages.len(),
            "Appended message"
        );
        self.persist();

        Some(stored)
    }

    /// Empties the current session's messages. No-op without a current session.
    pub fn clear_messages(&mut self) {
        let Some(current) = self.current_session_id.clone() else {
            return;
        };
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == current) else {
            return;
        };

        session.messages.clear();
        session.updated_at = self.clock.tick();
        tracing::debug!(session_id = %current, "Cleared messages");
        self.persist();
    }

    // ============================================================================
    // Transient request status (not persisted)
    // ============================================================================

    pub fn set_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Marks a request as in flight and clears the previous error.
    pub fn begin_request(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    /// Ends the in-flight request. Loading is reset on both outcomes; a
    /// failure message is kept in [`ChatStore::error`].
    pub fn complete_request(&mut self, result: std::result::Result<(), String>) {
        self.is_loading = false;
        self.error = result.err();
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    fn persist(&self) {
        self.persister.save_state(&self.snapshot());
    }

    /// Waits for queued writes; reports the first failure since the last flush.
    pub async fn flush(&self) -> Result<()> {
        self.persister.flush().await
    }

    /// Flush handle usable after the store (or its lock) is released.
    pub fn flush_handle(&self) -> FlushHandle {
        self.persister.flush_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageRole;
    use crate::clock::testing::FixedClock;
    use crate::storage::testing::MockStorage;
    use std::collections::HashSet;

    fn new_store() -> (ChatStore, Arc<MockStorage>) {
        let storage = Arc::new(MockStorage::new());
        let store = ChatStore::new(storage.clone());
        (store, storage)
    }

    fn frozen_store() -> (ChatStore, Arc<MockStorage>) {
        let storage = Arc::new(MockStorage::new());
        let store = ChatStore::with_clock(storage.clone(), Arc::new(FixedClock::at(1_000)));
        (store, storage)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let (store, _) = new_store();
        assert!(store.sessions().is_empty());
        assert!(store.current_session_id().is_none());
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_create_session_ids_are_unique() {
        let (mut store, _) = new_store();
        let ids: HashSet<String> = (0..50).map(|_| store.create_session(None)).collect();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_create_session_with_document() {
        let (mut store, _) = new_store();
        let id = store.create_session(Some("report.pdf"));

        let current = store.current_session().unwrap();
        assert_eq!(current.id, id);
        assert_eq!(current.document_name.as_deref(), Some("report.pdf"));
        assert_eq!(current.title, "report.pdf");
        assert!(current.messages.is_empty());
    }

    #[tokio::test]
    async fn test_create_session_default_titles() {
        let (mut store, _) = new_store();
        store.create_session(None);
        store.create_session(Some("  "));
        store.create_session(None);

        let titles: Vec<&str> = store.sessions().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["New Chat 3", "New Chat 2", "New Chat 1"]);
        assert!(store.sessions()[1].document_name.is_none());
    }

    #[tokio::test]
    async fn test_delete_current_moves_to_remaining_session() {
        let (mut store, _) = new_store();
        let other = store.create_session(None);
        let current = store.create_session(None);

        store.delete_session(&current);

        assert_eq!(store.current_session_id(), Some(other.as_str()));
        assert_eq!(store.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_last_session_clears_current() {
        let (mut store, _) = new_store();
        let id = store.create_session(None);

        store.delete_session(&id);

        assert!(store.current_session_id().is_none());
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let (mut store, storage) = new_store();
        let id = store.create_session(None);
        store.flush().await.unwrap();
        let writes = storage.write_count();

        store.delete_session("nope");
        store.flush().await.unwrap();

        assert_eq!(store.sessions().len(), 1);
        assert_eq!(store.current_session_id(), Some(id.as_str()));
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_newest_first_and_delete_non_current() {
        let (mut store, _) = new_store();
        let a = store.create_session(Some("report.pdf"));
        let b = store.create_session(None);

        let order: Vec<&str> = store.sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec![b.as_str(), a.as_str()]);

        store.delete_session(&a);

        let order: Vec<&str> = store.sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec![b.as_str()]);
        assert_eq!(store.current_session_id(), Some(b.as_str()));
    }

    #[tokio::test]
    async fn test_set_current_session_accepts_unknown_id() {
        let (mut store, _) = new_store();
        store.create_session(None);

        store.set_current_session("dangling");

        assert_eq!(store.current_session_id(), Some("dangling"));
        assert!(store.current_session().is_none());
    }

    #[tokio::test]
    async fn test_add_message_without_current_session_is_noop() {
        let (mut store, _) = new_store();
        assert!(store.add_message(NewMessage::user("x")).is_none());
        assert!(store.sessions().is_empty());

        store.create_session(None);
        store.set_current_session("dangling");
        let before = store.snapshot();
        assert!(store.add_message(NewMessage::user("x")).is_none());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_add_message_stamps_after_prior_update() {
        // Frozen clock: every stamp lands in the same millisecond
        let (mut store, _) = frozen_store();
        store.create_session(None);
        let prior_updated_at = store.current_session().unwrap().updated_at;

        store.add_message(NewMessage::user("x"));

        let session = store.current_session().unwrap();
        let last = session.last_message().unwrap();
        assert_eq!(last.role, MessageRole::User);
        assert_eq!(last.content, "x");
        assert!(last.timestamp > prior_updated_at);
        assert_eq!(session.updated_at, last.timestamp);
    }

    #[tokio::test]
    async fn test_messages_kept_in_call_order() {
        let (mut store, _) = new_store();
        store.create_session(None);

        store.add_message(NewMessage::user("q1"));
        store.add_message(NewMessage::assistant("a1"));
        store.add_message(NewMessage::user("q2"));

        let session = store.current_session().unwrap();
        let roles: Vec<MessageRole> = session.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
        );
        let contents: Vec<&str> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);
        assert!(session.messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_add_message_to_targets_named_session() {
        let (mut store, _) = new_store();
        let first = store.create_session(None);
        store.create_session(None);

        store.add_message_to(&first, NewMessage::assistant("late reply"));

        assert_eq!(store.session(&first).unwrap().messages.len(), 1);
        assert!(store.current_session().unwrap().messages.is_empty());
        assert!(store.add_message_to("nope", NewMessage::user("x")).is_none());
    }

    #[tokio::test]
    async fn test_clear_messages() {
        let (mut store, _) = frozen_store();
        store.create_session(None);
        for i in 0..4 {
            store.add_message(NewMessage::user(format!("m{}", i)));
        }
        let before = store.current_session().unwrap().updated_at;

        store.clear_messages();

        let session = store.current_session().unwrap();
        assert!(session.messages.is_empty());
        assert!(session.updated_at >= before);
    }

    #[tokio::test]
    async fn test_clear_messages_without_current_is_noop() {
        let (mut store, _) = new_store();
        store.clear_messages();
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_rename_session() {
        let (mut store, _) = frozen_store();
        let id = store.create_session(None);
        let before = store.session(&id).unwrap().updated_at;

        store.rename_session(&id, "Q3 results");
        store.rename_session("nope", "ignored");

        let session = store.session(&id).unwrap();
        assert_eq!(session.title, "Q3 results");
        assert!(session.updated_at > before);
        assert_eq!(store.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_updates_do_not_advance_clock() {
        let (mut store, _) = frozen_store();
        let id = store.create_session(None);

        store.rename_session("nope", "ignored");
        store.set_current_session("dangling");
        store.clear_messages();
        store.set_current_session(id.clone());

        let message = store.add_message(NewMessage::user("x")).unwrap();
        assert_eq!(store.session(&id).unwrap().created_at, 1_000);
        assert_eq!(message.timestamp, 1_001);
    }

    #[tokio::test]
    async fn test_loading_and_error_are_last_write_wins() {
        let (mut store, _) = new_store();
        store.set_loading(true);
        store.set_loading(true);
        store.set_loading(false);
        assert!(!store.is_loading());

        store.set_error(Some("first".to_string()));
        store.set_error(Some("second".to_string()));
        assert_eq!(store.error(), Some("second"));
        store.set_error(None);
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_request_lifecycle_resets_loading() {
        let (mut store, _) = new_store();
        store.set_error(Some("stale".to_string()));

        store.begin_request();
        assert!(store.is_loading());
        assert!(store.error().is_none());

        store.complete_request(Err("Failed to get response.".to_string()));
        assert!(!store.is_loading());
        assert_eq!(store.error(), Some("Failed to get response."));

        store.begin_request();
        store.complete_request(Ok(()));
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let (mut store, storage) = new_store();
        let a = store.create_session(Some("report.pdf"));
        store.add_message(NewMessage::user("revenue?"));
        store.add_message(NewMessage::assistant("4.2B"));
        store.create_session(None);
        store.set_current_session(a.clone());
        store.set_loading(true);
        store.set_error(Some("transient".to_string()));
        store.flush().await.unwrap();

        let reloaded = ChatStore::load(storage.clone()).await;

        assert_eq!(reloaded.sessions(), store.sessions());
        assert_eq!(reloaded.current_session_id(), Some(a.as_str()));
        assert!(!reloaded.is_loading());
        assert!(reloaded.error().is_none());
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let (mut store, storage) = new_store();
        store.create_session(Some("report.pdf"));
        store.add_message(NewMessage::user("hello"));
        store.set_loading(true);
        store.flush().await.unwrap();

        let raw = storage.raw(CHAT_STORAGE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        let state = &value["state"];
        assert_eq!(state["sessions"][0]["documentName"], "report.pdf");
        assert_eq!(state["sessions"][0]["messages"][0]["role"], "user");
        assert!(state["currentSessionId"].is_string());
        assert!(state.get("isLoading").is_none());
        assert!(state.get("error").is_none());
    }

    #[tokio::test]
    async fn test_flush_handle_after_store_dropped() {
        let (mut store, storage) = new_store();
        store.create_session(Some("10-K.pdf"));
        let handle = store.flush_handle();
        drop(store);

        handle.flush().await.unwrap();
        let state: PersistedChatState =
            persist::decode(&storage.raw(CHAT_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(state.sessions[0].title, "10-K.pdf");
    }

    #[tokio::test]
    async fn test_load_corrupt_slot_starts_empty() {
        let storage = Arc::new(MockStorage::new());
        storage.put_raw(CHAT_STORAGE_KEY, b"{not json");

        let store = ChatStore::load(storage).await;

        assert!(store.sessions().is_empty());
        assert!(store.current_session_id().is_none());
    }

    #[tokio::test]
    async fn test_reloaded_clock_stays_ahead_of_persisted_stamps() {
        let storage = Arc::new(MockStorage::new());
        let mut store = ChatStore::with_clock(storage.clone(), Arc::new(FixedClock::at(5_000)));
        store.create_session(None);
        store.add_message(NewMessage::user("x"));
        store.flush().await.unwrap();
        let last = store.current_session().unwrap().updated_at;

        // Clock went backwards between launches
        let mut reloaded =
            ChatStore::load_with_clock(storage, Arc::new(FixedClock::at(10))).await;
        let message = reloaded.add_message(NewMessage::user("y")).unwrap();

        assert!(message.timestamp > last);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let (mut store, storage) = new_store();
        storage.fail_writes(true);

        let id = store.create_session(None);
        store.add_message(NewMessage::user("x"));

        assert!(store.flush().await.is_err());
        assert_eq!(store.current_session().unwrap().id, id);
        assert_eq!(store.current_session().unwrap().messages.len(), 1);
    }
}
