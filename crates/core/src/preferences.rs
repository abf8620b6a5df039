//! Persisted UI preferences
//!
//! Only layout preferences survive a restart. The notification list lives in
//! memory for the session and is never written here.

use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Storage key for UI preferences
pub const UI_PREFERENCES_KEY: &str = "skillverse-ui";

/// Colour scheme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPreferences {
    #[serde(default)]
    pub sidebar_collapsed: bool,
    #[serde(default)]
    pub theme: Theme,
}

impl UiPreferences {
    /// Load preferences, falling back to defaults when missing or unreadable
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get(UI_PREFERENCES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable UI preferences: {}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to read UI preferences: {}", e);
                Self::default()
            }
        }
    }

    /// Persist preferences; returns false when the store rejected the write
    pub fn save(&self, store: &dyn KeyValueStore) -> bool {
        let raw = match serde_json::to_string(self) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize UI preferences: {}", e);
                return false;
            }
        };
        match store.set(UI_PREFERENCES_KEY, &raw) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save UI preferences: {}", e);
                false
            }
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
    }
}
