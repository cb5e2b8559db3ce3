use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult, UnknownProviderKindSnafu};

/// What a provider is used for. At most one provider per kind is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Chat,
    Fim,
    Embedding,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Fim => "fim",
            Self::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = BridgeError;

    fn from_str(raw: &str) -> BridgeResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "fim" => Ok(Self::Fim),
            "embedding" => Ok(Self::Embedding),
            _ => UnknownProviderKindSnafu {
                stage: "provider-kind-from-str",
                raw: raw.to_string(),
            }
            .fail(),
        }
    }
}

/// One provider registry entry with its connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub provider: String,
    pub api_hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,
    #[serde(default)]
    pub api_path: String,
    #[serde(default = "default_protocol")]
    pub api_protocol: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: ProviderKind,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            provider: "ollama".to_string(),
            api_hostname: "localhost".to_string(),
            api_port: Some(11434),
            api_path: String::new(),
            api_protocol: default_protocol(),
            model_name: model_name.into(),
            api_key: None,
        }
    }

    pub fn with_endpoint(
        mut self,
        hostname: impl Into<String>,
        port: Option<u16>,
        path: impl Into<String>,
    ) -> Self {
        self.api_hostname = hostname.into();
        self.api_port = port;
        self.api_path = path.into();
        self
    }

    /// Base URL assembled from protocol, hostname, port and path.
    pub fn endpoint_url(&self) -> String {
        let port = self
            .api_port
            .map(|port| format!(":{port}"))
            .unwrap_or_default();
        format!(
            "{}://{}{}{}",
            self.api_protocol, self.api_hostname, port, self.api_path
        )
    }
}

/// Provider registry snapshot keyed by provider id.
pub type ProviderMap = BTreeMap<String, Provider>;

/// Returns the providers of one kind, ordered by id.
pub fn providers_of_kind(providers: &ProviderMap, kind: ProviderKind) -> Vec<Provider> {
    providers
        .values()
        .filter(|provider| provider.kind == kind)
        .cloned()
        .collect()
}

fn default_protocol() -> String {
    "http".to_string()
}
