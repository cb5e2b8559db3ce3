use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "host.json";
pub const STATE_FILE_NAME: &str = "context.json";

/// Editor facts and fixtures the reference host reports to the webview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default)]
    pub selection: String,
    /// Staged diff used for commit-message turns.
    #[serde(default)]
    pub staged_diff: String,
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Context state file. `None` keeps context in memory.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default = "default_token_interval_ms")]
    pub token_interval_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language_id: None,
            language_name: None,
            selection: String::new(),
            staged_diff: String::new(),
            templates: default_templates(),
            config: BTreeMap::new(),
            state_path: None,
            token_interval_ms: default_token_interval_ms(),
        }
    }
}

impl HostSettings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn default_state_path() -> PathBuf {
        Self::default_config_dir().join(STATE_FILE_NAME)
    }

    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("host settings not found at {:?}, using defaults", path);
            return Self::default();
        }

        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Json::file(path));

        match figment.extract::<Self>() {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(
                    "failed to parse host settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Self::default()
            }
        }
    }

    pub fn token_interval(&self) -> Duration {
        Duration::from_millis(self.token_interval_ms)
    }

    pub fn language(&self) -> Value {
        serde_json::json!({
            "languageId": self.language_id,
            "name": self.language_name,
        })
    }
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_templates() -> Vec<String> {
    [
        "explain",
        "refactor",
        "add-tests",
        "add-types",
        "fix-code",
        "generate-docs",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_token_interval_ms() -> u64 {
    30
}
