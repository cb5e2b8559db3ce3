use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use parley_bridge::{ClientMessage, MessageChannel, discriminant as d};

use super::host_value::{HostValue, data_decoder};

/// Value from the host's global (cross-workspace) key/value context.
///
/// `set` only changes the local mirror.
pub struct GlobalContext<T> {
    key: String,
    value: HostValue<T>,
}

impl<T> GlobalContext<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn watch(channel: &MessageChannel, key: impl Into<String>) -> Self {
        let key = key.into();
        let value = HostValue::watch(
            channel,
            ClientMessage::GetGlobalContext { key: key.clone() },
            d::keyed(d::GLOBAL_CONTEXT_VALUE, &key),
            data_decoder(),
        );
        Self { key, value }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.get()
    }

    pub fn set(&self, value: T) {
        self.value.set_local(value);
    }
}

/// Value from the host's per-workspace key/value context.
pub struct WorkspaceContext<T> {
    key: String,
    channel: MessageChannel,
    value: HostValue<T>,
}

impl<T> WorkspaceContext<T>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    pub fn watch(channel: &MessageChannel, key: impl Into<String>) -> Self {
        Self::watch_with(channel, key, |_| {})
    }

    pub fn watch_with<F>(channel: &MessageChannel, key: impl Into<String>, on_update: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let key = key.into();
        let value = HostValue::watch_with(
            channel,
            ClientMessage::GetWorkspaceContext { key: key.clone() },
            d::keyed(d::WORKSPACE_CONTEXT_VALUE, &key),
            data_decoder(),
            on_update,
        );
        Self {
            key,
            channel: channel.clone(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.get()
    }

    /// Updates the local mirror and persists to the host, fire-and-forget.
    pub fn store(&self, value: T) {
        persist_workspace_value(&self.channel, &self.key, &value);
        self.value.set_local(value);
    }
}

/// Posts one `set-workspace-context` envelope. Serialization failures are logged.
pub fn persist_workspace_value<T: Serialize>(channel: &MessageChannel, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => channel.send_message(ClientMessage::SetWorkspaceContext {
            key: key.to_string(),
            value,
        }),
        Err(error) => {
            tracing::error!(key, error = %error, "failed to serialize workspace context value");
        }
    }
}
