use std::sync::Arc;

use serde::{Deserialize, Serialize};

use parley_bridge::{ClientMessage, MessageChannel, discriminant as d};

use super::host_value::{HostValue, data_decoder};

/// Scalar extension configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Number(_) | Self::Text(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }
}

/// One configuration setting looked up by key.
///
/// Changing the key re-sends the request and re-registers the listener.
pub struct ConfigSetting {
    channel: MessageChannel,
    key: String,
    value: HostValue<ConfigValue>,
}

impl ConfigSetting {
    pub fn watch(channel: &MessageChannel, key: impl Into<String>) -> Self {
        let key = key.into();
        let value = Self::subscribe(channel, &key);
        Self {
            channel: channel.clone(),
            key,
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<Arc<ConfigValue>> {
        self.value.get()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        if key == self.key {
            return;
        }

        // Replacing the hook drops the old subscription before the new value arrives.
        self.value = Self::subscribe(&self.channel, &key);
        self.key = key;
    }

    fn subscribe(channel: &MessageChannel, key: &str) -> HostValue<ConfigValue> {
        HostValue::watch(
            channel,
            ClientMessage::GetConfigValue {
                key: key.to_string(),
            },
            d::keyed(d::CONFIG_VALUE, key),
            data_decoder(),
        )
    }
}
