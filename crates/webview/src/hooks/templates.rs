use std::sync::Arc;

use parley_bridge::{ClientMessage, MessageChannel, discriminant as d};

use super::context::persist_workspace_value;
use super::host_value::{HostValue, data_decoder};

/// Prompt template names offered by the host.
pub struct Templates {
    channel: MessageChannel,
    list: HostValue<Vec<String>>,
}

impl Templates {
    pub fn watch(channel: &MessageChannel) -> Self {
        Self {
            channel: channel.clone(),
            list: HostValue::watch(
                channel,
                ClientMessage::ListTemplates,
                d::TEMPLATE_LIST,
                data_decoder(),
            ),
        }
    }

    pub fn get(&self) -> Option<Arc<Vec<String>>> {
        self.list.get()
    }

    /// Persists the user's template selection to workspace context.
    pub fn save_selected(&self, selected: &[String]) {
        persist_workspace_value(
            &self.channel,
            d::context_key::SELECTED_TEMPLATES,
            &selected,
        );
    }
}
