//! Chat use case.
//!
//! Drives one question/answer round trip through the chat store: append
//! the user's message, mark the request in flight, ask the assistant, then
//! append the reply or record the failure. The store lock is never held
//! while waiting on the assistant.

use std::sync::Arc;

use pifi_core::chat::{AssistantResponder, ChatStore, Message, NewMessage};
use pifi_core::document::{DocumentIndexer, DocumentStore, validate_document};
use pifi_core::error::{PifiError, Result};
use tokio::sync::Mutex;

/// Error text shown to the user when the assistant request fails.
pub const RESPONSE_FAILED_MESSAGE: &str = "Failed to get response.";

/// Error text shown to the user when a report upload fails.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Try again.";

/// Coordinates chat screens with the stores, the assistant and the indexer.
#[derive(Clone)]
pub struct ChatUseCase {
    chat_store: Arc<Mutex<ChatStore>>,
    document_store: Arc<Mutex<DocumentStore>>,
    responder: Arc<dyn AssistantResponder>,
    indexer: Arc<dyn DocumentIndexer>,
}

impl ChatUseCase {
    pub fn new(
        chat_store: Arc<Mutex<ChatStore>>,
        document_store: Arc<Mutex<DocumentStore>>,
        responder: Arc<dyn AssistantResponder>,
        indexer: Arc<dyn DocumentIndexer>,
    ) -> Self {
        Self {
            chat_store,
            document_store,
            responder,
            indexer,
        }
    }

    /// Starts a new chat. A document name only sets the title; use
    /// [`ChatUseCase::analyze_document`] to upload a report.
    pub async fn start_chat(&self, document_name: Option<&str>) -> String {
        let session_id = self.chat_store.lock().await.create_session(document_name);
        tracing::info!(session_id = %session_id, "Started chat");
        session_id
    }

    /// Uploads a report, then opens a chat about it.
    ///
    /// The document flag and the new session only change once the backend
    /// has indexed the file. A failed upload records
    /// [`UPLOAD_FAILED_MESSAGE`] and returns the underlying error.
    pub async fn analyze_document(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let file_name = file_name.trim();
        validate_document(file_name, bytes.len())?;

        if let Err(e) = self.indexer.index_document(file_name, bytes).await {
            tracing::warn!(file_name = %file_name, error = %e, "Document upload failed");
            self.chat_store
                .lock()
                .await
                .set_error(Some(UPLOAD_FAILED_MESSAGE.to_string()));
            return Err(e);
        }

        self.document_store.lock().await.set_document_uploaded(true);
        let session_id = self
            .chat_store
            .lock()
            .await
            .create_session(Some(file_name));

        tracing::info!(session_id = %session_id, file_name = %file_name, "Started document chat");
        Ok(session_id)
    }

    /// Selects an existing chat.
    pub async fn open_chat(&self, session_id: &str) {
        self.chat_store.lock().await.set_current_session(session_id);
    }

    /// Sends `content` to the assistant from the current chat.
    ///
    /// Returns the stored assistant reply. The loading flag is reset whatever
    /// the outcome; on failure the store's error is set to
    /// [`RESPONSE_FAILED_MESSAGE`] and the underlying error is returned.
    ///
    /// The request runs on its own task: dropping the returned future stops
    /// the wait, not the request, and the store still gets the reply (or the
    /// failure) and a cleared loading flag.
    pub async fn send_message(&self, content: &str) -> Result<Message> {
        let question = content.trim();
        if question.is_empty() {
            return Err(PifiError::invalid_input("Message must not be empty"));
        }

        let (session_id, session) = {
            let mut store = self.chat_store.lock().await;
            let Some(session_id) = store.current_session().map(|s| s.id.clone()) else {
                let id = store.current_session_id().unwrap_or("<none>").to_string();
                return Err(PifiError::not_found("session", id));
            };

            store.add_message_to(&session_id, NewMessage::user(question));
            store.begin_request();

            let session = store
                .session(&session_id)
                .cloned()
                .ok_or_else(|| PifiError::not_found("session", session_id.clone()))?;
            (session_id, session)
        };

        let chat_store = self.chat_store.clone();
        let responder = self.responder.clone();
        let question = question.to_string();
        let request = tokio::spawn(async move {
            let reply = responder.respond(&session, &question).await;

            let mut store = chat_store.lock().await;
            match reply {
                Ok(answer) => {
                    store.complete_request(Ok(()));
                    // Deliver to the chat that asked, even if the user moved on
                    store
                        .add_message_to(&session.id, NewMessage::assistant(answer))
                        .ok_or_else(|| PifiError::not_found("session", session.id.clone()))
                }
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "Assistant request failed");
                    store.complete_request(Err(RESPONSE_FAILED_MESSAGE.to_string()));
                    Err(e)
                }
            }
        });

        match request.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Assistant task aborted");
                self.chat_store
                    .lock()
                    .await
                    .complete_request(Err(RESPONSE_FAILED_MESSAGE.to_string()));
                Err(PifiError::internal(format!("Assistant task failed: {e}")))
            }
        }
    }
}
