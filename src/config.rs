use serde::{Deserialize, Serialize};

use crate::error::TimerError;
use crate::keybinds::KeyBindConfig;
use crate::storage::{Store, StoreExt, StorageKey};

pub const DEFAULT_TICK_RATE_MS: u64 = 50;

/// User settings, kept under the durable `settings` key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub key_binds: KeyBindConfig,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
}

fn default_tick_rate_ms() -> u64 {
    DEFAULT_TICK_RATE_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_binds: KeyBindConfig::default(),
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
        }
    }
}

impl Settings {
    /// Load from the store. Missing or unreadable settings fall back to defaults.
    pub fn load(store: &dyn Store) -> Self {
        match store.get::<Settings>(StorageKey::Settings) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<(), TimerError> {
        store.set(StorageKey::Settings, self)
    }
}
