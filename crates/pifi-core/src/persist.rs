//! Slot persistence: envelope encoding and the background writer.
//!
//! A store mutates its in-memory state synchronously, encodes a snapshot,
//! and hands the bytes to its [`Persister`]. The persister owns a single
//! writer task per slot, so writes land in call order and the last mutation
//! is always the last write. Callers never wait on I/O unless they ask to
//! via [`Persister::flush`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{PifiError, Result};
use crate::storage::KeyValueStorage;

/// Envelope version written by this build.
pub const PERSIST_VERSION: u32 = 0;

/// On-disk wrapper around a store's persisted record.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

/// Encodes a persisted record into slot bytes.
pub fn encode<T: Serialize>(state: &T) -> Result<Vec<u8>> {
    let envelope = Envelope {
        state,
        version: PERSIST_VERSION,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decodes slot bytes written by [`encode`].
///
/// Records stamped with a newer version than [`PERSIST_VERSION`] are
/// rejected rather than guessed at.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
    if envelope.version > PERSIST_VERSION {
        return Err(PifiError::migration(format!(
            "persisted version {} is newer than supported version {}",
            envelope.version, PERSIST_VERSION
        )));
    }
    Ok(envelope.state)
}

/// Reads and decodes the record stored under `key`.
///
/// # Returns
///
/// - `Ok(Some(T))`: Record found and decoded
/// - `Ok(None)`: Slot is empty
/// - `Err(_)`: Storage failed or the record is unreadable
pub async fn rehydrate<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>> {
    match storage.get(key).await? {
        Some(bytes) if !bytes.is_empty() => decode(&bytes).map(Some),
        _ => Ok(None),
    }
}

enum Command {
    Write(Vec<u8>),
    Flush(oneshot::Sender<Result<()>>),
}

/// Fire-and-forget writer for one storage slot.
///
/// Must be created inside a tokio runtime. Dropping the persister lets the
/// writer drain what is already queued and then exit.
pub struct Persister {
    key: String,
    tx: mpsc::UnboundedSender<Command>,
}

impl Persister {
    /// Spawns the writer task for `key`.
    pub fn spawn(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(storage, key.clone(), rx));
        Self { key, tx }
    }

    /// Queues `bytes` to be written. Returns immediately.
    pub fn save(&self, bytes: Vec<u8>) {
        if self.tx.send(Command::Write(bytes)).is_err() {
            tracing::warn!(key = %self.key, "Persistence writer has stopped; dropping write");
        }
    }

    /// Encodes `state` and queues it. Encoding failures are logged.
    pub fn save_state<T: Serialize>(&self, state: &T) {
        match encode(state) {
            Ok(bytes) => self.save(bytes),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to encode state for persistence")
            }
        }
    }

    /// Waits until every write queued before this call has been applied.
    ///
    /// Returns the first write failure observed since the previous flush.
    pub async fn flush(&self) -> Result<()> {
        self.flush_handle().flush().await
    }

    /// A detached handle for flushing without borrowing the owning store.
    pub fn flush_handle(&self) -> FlushHandle {
        FlushHandle {
            tx: self.tx.clone(),
        }
    }
}

/// Cloneable handle that waits on a [`Persister`]'s queue.
///
/// The flush request is queued behind every write sent before it, so a
/// handle taken under a store lock can be awaited after the lock is gone.
#[derive(Clone)]
pub struct FlushHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl FlushHandle {
    /// See [`Persister::flush`].
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| PifiError::internal("Persistence writer has stopped"))?;
        reply_rx
            .await
            .map_err(|e| PifiError::internal(format!("Failed to join persistence writer: {}", e)))?
    }
}

impl std::fmt::Debug for FlushHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushHandle").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister").field("key", &self.key).finish()
    }
}

async fn run_writer(
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending_failure: Option<PifiError> = None;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(bytes) => {
                if let Err(e) = storage.set(&key, &bytes).await {
                    tracing::warn!(key = %key, error = %e, "Failed to persist state; keeping in-memory state");
                    pending_failure.get_or_insert(e);
                } else {
                    tracing::trace!(key = %key, bytes = bytes.len(), "Persisted state");
                }
            }
            Command::Flush(reply) => {
                let result = match pending_failure.take() {
                    Some(e) => Err(e),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
        }
    }

    tracing::debug!(key = %key, "Persistence writer stopped");
}
