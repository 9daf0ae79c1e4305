//! Key-value storage abstraction.
//!
//! Stores persist themselves into a single slot of a durable key-value
//! storage. This module defines the contract; concrete adapters live in
//! `pifi-infrastructure`.

use async_trait::async_trait;

use crate::error::Result;

/// An abstract async key-value storage.
///
/// Values are opaque bytes. Each store owns exactly one key and is the only
/// writer of that key.
///
/// # Implementation Notes
///
/// Implementations should make `set` atomic: a reader must observe either
/// the previous value or the new one, never a partial write.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))`: Value found
    /// - `Ok(None)`: Nothing stored under `key`
    /// - `Err(_)`: Storage could not be read
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::KeyValueStorage;
    use crate::error::{PifiError, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Mock KeyValueStorage for testing
    #[derive(Default)]
    pub struct MockStorage {
        values: Mutex<HashMap<String, Vec<u8>>>,
        writes: Mutex<Vec<String>>,
        fail_writes: AtomicBool,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
            self.values.lock().unwrap().get(key).cloned()
        }

        pub fn put_raw(&self, key: &str, value: &[u8]) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl KeyValueStorage for MockStorage {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PifiError::storage("disk full"));
            }
            self.writes.lock().unwrap().push(key.to_string());
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
