//! Persisted playback preferences.
//!
//! Loop mode and shuffle survive restarts through the host `SettingsStore`.
//! Reads and writes are best effort: a missing, unreadable or malformed
//! value falls back to the default and a failed write is only logged.

use bridge_traits::SettingsStore;
use core_playback::LoopMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const LOOP_MODE_KEY: &str = "playback.loop_mode";
pub const SHUFFLE_KEY: &str = "playback.shuffle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackPreferences {
    pub loop_mode: LoopMode,
    pub shuffle: bool,
}

/// Reads and writes [`PlaybackPreferences`]; a disabled store does neither.
#[derive(Clone)]
pub struct PreferenceStore {
    settings: Arc<dyn SettingsStore>,
    enabled: bool,
}

impl PreferenceStore {
    pub fn new(settings: Arc<dyn SettingsStore>, enabled: bool) -> Self {
        Self { settings, enabled }
    }

    pub async fn load(&self) -> PlaybackPreferences {
        let mut preferences = PlaybackPreferences::default();
        if !self.enabled {
            return preferences;
        }

        match self.settings.get_string(LOOP_MODE_KEY).await {
            Ok(Some(value)) => match value.parse::<LoopMode>() {
                Ok(mode) => preferences.loop_mode = mode,
                Err(e) => warn!(%value, error = %e, "Ignoring saved loop mode"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read saved loop mode"),
        }

        match self.settings.get_bool(SHUFFLE_KEY).await {
            Ok(Some(shuffle)) => preferences.shuffle = shuffle,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read saved shuffle"),
        }

        debug!(?preferences, "Loaded playback preferences");
        preferences
    }

    pub async fn save_loop_mode(&self, mode: LoopMode) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.settings.set_string(LOOP_MODE_KEY, mode.as_str()).await {
            warn!(error = %e, %mode, "Failed to save loop mode");
        }
    }

    pub async fn save_shuffle(&self, shuffle: bool) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.settings.set_bool(SHUFFLE_KEY, shuffle).await {
            warn!(error = %e, shuffle, "Failed to save shuffle");
        }
    }
}
