//! Composition root.
//!
//! Builds configuration, logging, storage, the stores and the backend
//! client once, and hands out shared handles. Nothing in the workspace
//! reaches for a global store; everything goes through `AppContext`.

use std::sync::Arc;

use anyhow::{Context, Result};
use pifi_core::chat::{AssistantResponder, ChatStore};
use pifi_core::document::{DocumentIndexer, DocumentStore};
use pifi_core::storage::KeyValueStorage;
use pifi_core::user::UserStore;
use pifi_infrastructure::logging::init_logging;
use pifi_infrastructure::paths::PifiPaths;
use pifi_infrastructure::{FileStorage, PifiConfig};
use pifi_interaction::BackendClient;
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;

use crate::chat_usecase::ChatUseCase;

/// Error text shown when the backend status check fails.
pub const BACKEND_UNREACHABLE_MESSAGE: &str = "Cannot reach backend.";

/// Application-wide handles, owned by the host.
pub struct AppContext {
    pub config: PifiConfig,
    pub chat_store: Arc<Mutex<ChatStore>>,
    pub user_store: Arc<Mutex<UserStore>>,
    pub document_store: Arc<Mutex<DocumentStore>>,
    pub backend: Arc<BackendClient>,
    pub chat: ChatUseCase,
    _log_guard: Option<WorkerGuard>,
}

impl AppContext {
    /// Boots from the platform config file and file-backed storage.
    ///
    /// Must run inside a tokio runtime.
    pub async fn bootstrap() -> Result<Self> {
        let config = PifiConfig::load().context("Failed to load config.toml")?;

        let logs_dir = PifiPaths::logs_dir().ok();
        let log_guard = init_logging(&config.logging, logs_dir.as_deref());

        let storage_dir = config
            .storage_dir()
            .context("Failed to resolve storage directory")?;
        tracing::info!("[Bootstrap] Using storage at: {:?}", storage_dir);

        let storage: Arc<dyn KeyValueStorage> = Arc::new(
            FileStorage::new(storage_dir).context("Failed to open file storage")?,
        );

        let mut context = Self::with_storage(config, storage).await?;
        context._log_guard = log_guard;
        Ok(context)
    }

    /// Assembles the context over an explicit storage, talking to the
    /// backend from `config`. Does not touch logging.
    pub async fn with_storage(config: PifiConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let backend = Arc::new(
            BackendClient::from_settings(&config.backend)
                .context("Failed to create backend client")?,
        );
        let responder: Arc<dyn AssistantResponder> = backend.clone();
        let indexer: Arc<dyn DocumentIndexer> = backend.clone();
        Self::assemble(config, storage, backend, responder, indexer).await
    }

    /// Assembles the context with custom assistant and indexing backends.
    pub async fn assemble(
        config: PifiConfig,
        storage: Arc<dyn KeyValueStorage>,
        backend: Arc<BackendClient>,
        responder: Arc<dyn AssistantResponder>,
        indexer: Arc<dyn DocumentIndexer>,
    ) -> Result<Self> {
        let chat_store = Arc::new(Mutex::new(ChatStore::load(storage.clone()).await));
        let user_store = Arc::new(Mutex::new(UserStore::load(storage).await));
        let document_store = Arc::new(Mutex::new(DocumentStore::new()));

        let chat = ChatUseCase::new(
            chat_store.clone(),
            document_store.clone(),
            responder,
            indexer,
        );

        tracing::info!(
            "[Bootstrap] Loaded {} chat session(s)",
            chat_store.lock().await.sessions().len()
        );

        Ok(Self {
            config,
            chat_store,
            user_store,
            document_store,
            backend,
            chat,
            _log_guard: None,
        })
    }

    /// Asks the backend whether a document is indexed.
    ///
    /// An unreachable backend is recorded as the chat store's error and
    /// reported as `false`.
    pub async fn check_backend(&self) -> bool {
        match self.backend.status().await {
            Ok(status) => {
                self.document_store
                    .lock()
                    .await
                    .set_document_uploaded(status.indexed);
                status.indexed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Backend status check failed");
                self.chat_store
                    .lock()
                    .await
                    .set_error(Some(BACKEND_UNREACHABLE_MESSAGE.to_string()));
                false
            }
        }
    }

    /// Waits for all queued store writes.
    ///
    /// Store locks are only held long enough to take a flush handle.
    pub async fn flush(&self) -> Result<()> {
        let chat = self.chat_store.lock().await.flush_handle();
        let user = self.user_store.lock().await.flush_handle();

        chat.flush().await.context("Failed to persist chat sessions")?;
        user.flush().await.context("Failed to persist user preferences")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pifi_core::chat::{CHAT_STORAGE_KEY, NewMessage};
    use pifi_core::error::Result as PifiResult;
    use pifi_core::user::Theme;
    use pifi_infrastructure::MemoryStorage;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    // Storage whose writes wait until the test opens the gate
    struct GatedStorage {
        inner: MemoryStorage,
        gate: Semaphore,
    }

    #[async_trait]
    impl KeyValueStorage for GatedStorage {
        async fn get(&self, key: &str) -> PifiResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> PifiResult<()> {
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> PifiResult<()> {
            self.inner.remove(key).await
        }
    }

    fn offline_config() -> PifiConfig {
        let mut config = PifiConfig::default();
        config.backend.base_url = "http://127.0.0.1:9".to_string();
        config.backend.timeout_secs = 2;
        config
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());

        let first = AppContext::with_storage(offline_config(), storage.clone())
            .await
            .unwrap();
        let id = first.chat.start_chat(Some("report.pdf")).await;
        first
            .chat_store
            .lock()
            .await
            .add_message(NewMessage::user("What is net margin?"));
        first.user_store.lock().await.set_theme(Theme::Dark);
        first.flush().await.unwrap();

        let second = AppContext::with_storage(offline_config(), storage).await.unwrap();
        let chat_store = second.chat_store.lock().await;
        assert_eq!(chat_store.current_session_id(), Some(id.as_str()));
        assert_eq!(chat_store.current_session().unwrap().messages.len(), 1);
        assert_eq!(second.user_store.lock().await.theme(), Theme::Dark);
        // Document flag is process-local
        assert!(!second.document_store.lock().await.is_document_uploaded());
    }

    #[tokio::test]
    async fn test_file_storage_restart() {
        let temp_dir = TempDir::new().unwrap();
        let storage: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::new(temp_dir.path()).unwrap());

        let first = AppContext::with_storage(offline_config(), storage.clone())
            .await
            .unwrap();
        first.chat.start_chat(None).await;
        first.chat.start_chat(None).await;
        first.flush().await.unwrap();

        let reopened: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::new(temp_dir.path()).unwrap());
        let second = AppContext::with_storage(offline_config(), reopened).await.unwrap();
        let titles: Vec<String> = second
            .chat_store
            .lock()
            .await
            .sessions()
            .iter()
            .map(|s| s.title.clone())
            .collect();
        assert_eq!(titles, vec!["New Chat 2", "New Chat 1"]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_sets_error() {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let context = AppContext::with_storage(offline_config(), storage).await.unwrap();

        assert!(!context.check_backend().await);
        assert_eq!(
            context.chat_store.lock().await.error(),
            Some(BACKEND_UNREACHABLE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_flush_does_not_hold_store_locks() {
        let storage = Arc::new(GatedStorage {
            inner: MemoryStorage::new(),
            gate: Semaphore::new(0),
        });
        let context = Arc::new(
            AppContext::with_storage(offline_config(), storage.clone())
                .await
                .unwrap(),
        );
        context.chat.start_chat(None).await;

        let flushing = {
            let context = context.clone();
            tokio::spawn(async move { context.flush().await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The write is stuck behind the gate, yet the store stays usable
        let store = tokio::time::timeout(Duration::from_secs(1), context.chat_store.lock())
            .await
            .expect("chat store lock held during flush");
        assert_eq!(store.sessions().len(), 1);
        drop(store);
        assert!(!flushing.is_finished());

        storage.gate.add_permits(16);
        flushing.await.unwrap().unwrap();
        assert!(storage.inner.get(CHAT_STORAGE_KEY).await.unwrap().is_some());
    }
}
