use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "webview.json";

/// Local webview preferences. Host-owned flags live in workspace context instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebviewSettings {
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
    /// Send the transcript to workspace context after every completed turn.
    #[serde(default = "default_true")]
    pub persist_conversation: bool,
    /// Replace the empty transcript with the host's last conversation on mount.
    #[serde(default = "default_true")]
    pub restore_conversation: bool,
}

impl Default for WebviewSettings {
    fn default() -> Self {
        Self {
            scroll_settle_ms: default_scroll_settle_ms(),
            persist_conversation: true,
            restore_conversation: true,
        }
    }
}

impl WebviewSettings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    /// Reads settings layered over defaults. A missing or broken file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("webview settings not found at {:?}, using defaults", path);
            return Self::default();
        }

        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Json::file(path));

        match figment.extract::<Self>() {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(
                    "failed to parse webview settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Self::default()
            }
        }
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

fn default_scroll_settle_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}
