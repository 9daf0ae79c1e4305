//! User preference domain models.

use serde::{Deserialize, Serialize};

/// Self-reported familiarity with financial reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// User profile collected during onboarding and in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: None,
            avatar: None,
            financial_interests: Some(Vec::new()),
            experience_level: Some(ExperienceLevel::Beginner),
        }
    }
}

/// A partial profile. Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub financial_interests: Option<Vec<String>>,
    pub experience_level: Option<ExperienceLevel>,
}

impl UserProfile {
    /// Shallow-merges `update` into this profile.
    pub fn merge(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(avatar) = update.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(interests) = update.financial_interests {
            self.financial_interests = Some(interests);
        }
        if let Some(level) = update.experience_level {
            self.experience_level = Some(level);
        }
    }
}

/// Everything the user store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub is_onboarded: bool,
    #[serde(default)]
    pub theme: Theme,
}
