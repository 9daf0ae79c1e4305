//! The user preference store.

use std::sync::Arc;

use super::model::{ProfileUpdate, Theme, UserPreferences, UserProfile};
use crate::error::Result;
use crate::persist::{self, FlushHandle, Persister};
use crate::storage::KeyValueStorage;

/// Storage key of the user slot.
pub const USER_STORAGE_KEY: &str = "pifi-user-storage";

/// Holds the user profile, onboarding flag and theme.
///
/// Every setter persists through the same fire-and-forget writer as the
/// chat store.
#[derive(Debug)]
pub struct UserStore {
    preferences: UserPreferences,
    persister: Persister,
}

impl UserStore {
    /// Creates a store with default preferences.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            preferences: UserPreferences::default(),
            persister: Persister::spawn(storage, USER_STORAGE_KEY),
        }
    }

    /// Rehydrates the store; unreadable slots fall back to defaults.
    pub async fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let preferences =
            match persist::rehydrate::<UserPreferences>(storage.as_ref(), USER_STORAGE_KEY).await {
                Ok(Some(preferences)) => preferences,
                Ok(None) => UserPreferences::default(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to rehydrate user preferences; using defaults");
                    UserPreferences::default()
                }
            };

        Self {
            preferences,
            persister: Persister::spawn(storage, USER_STORAGE_KEY),
        }
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn profile(&self) -> &UserProfile {
        &self.preferences.profile
    }

    pub fn is_onboarded(&self) -> bool {
        self.preferences.is_onboarded
    }

    pub fn theme(&self) -> Theme {
        self.preferences.theme
    }

    /// Merges a partial profile into the stored one.
    pub fn update_profile(&mut self, update: ProfileUpdate) {
        self.preferences.profile.merge(update);
        tracing::debug!("Updated user profile");
        self.persist();
    }

    pub fn set_onboarded(&mut self, value: bool) {
        self.preferences.is_onboarded = value;
        self.persist();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.preferences.theme = theme;
        self.persist();
    }

    fn persist(&self) {
        self.persister.save_state(&self.preferences);
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
