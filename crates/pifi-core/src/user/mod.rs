//! User preference module.
//!
//! # Module Structure
//!
//! - `model`: Profile and preference models
//! - `store`: The persisted user store (`UserStore`)

mod model;
mod store;

// Re-export public API
pub use model::{ExperienceLevel, ProfileUpdate, Theme, UserPreferences, UserProfile};
pub use store::{USER_STORAGE_KEY, UserStore};
