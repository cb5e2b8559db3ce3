use serde::{Deserialize, Serialize};

use parley_bridge::{ClientMessage, HostEnvelope, MessageChannel, discriminant as d};

use super::host_value::{HostValue, data_decoder};

/// Editor color theme family reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    Light,
    Dark,
    HighContrast,
}

/// Language of the active editor document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorLanguage {
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn watch_theme(channel: &MessageChannel) -> HostValue<Theme> {
    HostValue::watch(
        channel,
        ClientMessage::GetTheme,
        d::THEME_CHANGED,
        data_decoder(),
    )
}

pub fn watch_language(channel: &MessageChannel) -> HostValue<EditorLanguage> {
    HostValue::watch(
        channel,
        ClientMessage::GetLanguage,
        d::LANGUAGE_CHANGED,
        data_decoder(),
    )
}

/// Mirrors the editor text selection; `on_select` runs after every update.
pub fn watch_selection<F>(channel: &MessageChannel, on_select: F) -> HostValue<String>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    HostValue::watch_with(
        channel,
        ClientMessage::GetSelection,
        d::SELECTION_CHANGED,
        decode_selection,
        move |selection: &std::sync::Arc<String>| on_select(selection),
    )
}

fn decode_selection(envelope: &HostEnvelope) -> Option<String> {
    Some(envelope.completion().unwrap_or_default().trim().to_string())
}
