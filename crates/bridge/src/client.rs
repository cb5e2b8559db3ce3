use serde::Serialize;
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

use crate::discriminant as d;
use crate::envelope::{ClientEnvelope, Epoch};
use crate::error::{
    BridgeResult, EncodePayloadSnafu, MissingPayloadSnafu, UnknownDiscriminantSnafu,
};
use crate::message::ChatMessage;
use crate::provider::Provider;

/// Typed view of every envelope the webview can post.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    GetSelection,
    GetTheme,
    GetLanguage,
    GetGlobalContext { key: String },
    GetWorkspaceContext { key: String },
    SetWorkspaceContext { key: String, value: Value },
    GetConfigValue { key: String },
    ListTemplates,
    Chat { history: Vec<ChatMessage>, epoch: Epoch },
    StopGeneration { epoch: Option<Epoch> },
    GetGitChanges,
    GetAllProviders,
    GetActiveChatProvider,
    GetActiveFimProvider,
    AddProvider(Provider),
    UpdateProvider(Provider),
    RemoveProvider(Provider),
    CopyProvider(Provider),
    ResetProviders,
    SetActiveChatProvider(Provider),
    SetActiveFimProvider(Provider),
}

impl ClientMessage {
    pub fn discriminant(&self) -> &'static str {
        match self {
            Self::GetSelection => d::GET_SELECTION,
            Self::GetTheme => d::GET_THEME,
            Self::GetLanguage => d::GET_LANGUAGE,
            Self::GetGlobalContext { .. } => d::GET_GLOBAL_CONTEXT,
            Self::GetWorkspaceContext { .. } => d::GET_WORKSPACE_CONTEXT,
            Self::SetWorkspaceContext { .. } => d::SET_WORKSPACE_CONTEXT,
            Self::GetConfigValue { .. } => d::GET_CONFIG_VALUE,
            Self::ListTemplates => d::LIST_TEMPLATES,
            Self::Chat { .. } => d::CHAT_MESSAGE,
            Self::StopGeneration { .. } => d::STOP_GENERATION,
            Self::GetGitChanges => d::GET_GIT_CHANGES,
            Self::GetAllProviders => d::GET_ALL_PROVIDERS,
            Self::GetActiveChatProvider => d::GET_ACTIVE_CHAT_PROVIDER,
            Self::GetActiveFimProvider => d::GET_ACTIVE_FIM_PROVIDER,
            Self::AddProvider(_) => d::ADD_PROVIDER,
            Self::UpdateProvider(_) => d::UPDATE_PROVIDER,
            Self::RemoveProvider(_) => d::REMOVE_PROVIDER,
            Self::CopyProvider(_) => d::COPY_PROVIDER,
            Self::ResetProviders => d::RESET_PROVIDERS,
            Self::SetActiveChatProvider(_) => d::SET_ACTIVE_CHAT_PROVIDER,
            Self::SetActiveFimProvider(_) => d::SET_ACTIVE_FIM_PROVIDER,
        }
    }

    pub fn into_envelope(self) -> BridgeResult<ClientEnvelope> {
        let discriminant = self.discriminant();
        let envelope = ClientEnvelope::new(discriminant);

        let envelope = match self {
            Self::GetSelection
            | Self::GetTheme
            | Self::GetLanguage
            | Self::ListTemplates
            | Self::GetGitChanges
            | Self::GetAllProviders
            | Self::GetActiveChatProvider
            | Self::GetActiveFimProvider
            | Self::ResetProviders => envelope,
            Self::GetGlobalContext { key }
            | Self::GetWorkspaceContext { key }
            | Self::GetConfigValue { key } => envelope.with_key(key),
            Self::SetWorkspaceContext { key, value } => envelope.with_key(key).with_data(value),
            Self::Chat { history, epoch } => envelope
                .with_data(encode(discriminant, &history)?)
                .with_epoch(epoch),
            Self::StopGeneration { epoch } => ClientEnvelope { epoch, ..envelope },
            Self::AddProvider(provider)
            | Self::UpdateProvider(provider)
            | Self::RemoveProvider(provider)
            | Self::CopyProvider(provider)
            | Self::SetActiveChatProvider(provider)
            | Self::SetActiveFimProvider(provider) => {
                envelope.with_data(encode(discriminant, &provider)?)
            }
        };

        Ok(envelope)
    }
}

impl TryFrom<&ClientEnvelope> for ClientMessage {
    type Error = crate::error::BridgeError;

    fn try_from(envelope: &ClientEnvelope) -> BridgeResult<Self> {
        let message = match envelope.kind.as_str() {
            d::GET_SELECTION => Self::GetSelection,
            d::GET_THEME => Self::GetTheme,
            d::GET_LANGUAGE => Self::GetLanguage,
            d::GET_GLOBAL_CONTEXT => Self::GetGlobalContext {
                key: required_key(envelope)?,
            },
            d::GET_WORKSPACE_CONTEXT => Self::GetWorkspaceContext {
                key: required_key(envelope)?,
            },
            d::SET_WORKSPACE_CONTEXT => Self::SetWorkspaceContext {
                key: required_key(envelope)?,
                value: envelope.data.clone().unwrap_or(Value::Null),
            },
            d::GET_CONFIG_VALUE => Self::GetConfigValue {
                key: required_key(envelope)?,
            },
            d::LIST_TEMPLATES => Self::ListTemplates,
            d::CHAT_MESSAGE => Self::Chat {
                history: envelope.decode_data()?,
                // Clients predating epochs are treated as turn zero.
                epoch: envelope.epoch.unwrap_or_default(),
            },
            d::STOP_GENERATION => Self::StopGeneration {
                epoch: envelope.epoch,
            },
            d::GET_GIT_CHANGES => Self::GetGitChanges,
            d::GET_ALL_PROVIDERS => Self::GetAllProviders,
            d::GET_ACTIVE_CHAT_PROVIDER => Self::GetActiveChatProvider,
            d::GET_ACTIVE_FIM_PROVIDER => Self::GetActiveFimProvider,
            d::ADD_PROVIDER => Self::AddProvider(envelope.decode_data()?),
            d::UPDATE_PROVIDER => Self::UpdateProvider(envelope.decode_data()?),
            d::REMOVE_PROVIDER => Self::RemoveProvider(envelope.decode_data()?),
            d::COPY_PROVIDER => Self::CopyProvider(envelope.decode_data()?),
            d::RESET_PROVIDERS => Self::ResetProviders,
            d::SET_ACTIVE_CHAT_PROVIDER => Self::SetActiveChatProvider(envelope.decode_data()?),
            d::SET_ACTIVE_FIM_PROVIDER => Self::SetActiveFimProvider(envelope.decode_data()?),
            other => {
                return UnknownDiscriminantSnafu {
                    stage: "client-message-from-envelope",
                    discriminant: other.to_string(),
                }
                .fail();
            }
        };

        Ok(message)
    }
}

fn required_key(envelope: &ClientEnvelope) -> BridgeResult<String> {
    envelope.key.clone().context(MissingPayloadSnafu {
        stage: "client-message-required-key",
        discriminant: envelope.kind.clone(),
    })
}

fn encode<T: Serialize>(discriminant: &'static str, payload: &T) -> BridgeResult<Value> {
    serde_json::to_value(payload).context(EncodePayloadSnafu {
        stage: "client-message-encode",
        discriminant,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::provider::ProviderKind;

    #[test]
    fn chat_message_carries_history_and_epoch() {
        let envelope = ClientMessage::Chat {
            history: vec![ChatMessage::user("Hello")],
            epoch: Epoch::new(7),
        }
        .into_envelope()
        .expect("encode");

        assert_eq!(envelope.kind, d::CHAT_MESSAGE);
        assert_eq!(envelope.epoch, Some(Epoch::new(7)));
        assert_eq!(
            envelope.data,
            Some(json!([{ "role": "user", "content": "Hello" }]))
        );
    }

    #[test]
    fn keyed_requests_parse_back() {
        let envelope = ClientMessage::GetWorkspaceContext {
            key: "auto-scroll".to_string(),
        }
        .into_envelope()
        .expect("encode");

        assert_eq!(
            ClientMessage::try_from(&envelope).expect("parse"),
            ClientMessage::GetWorkspaceContext {
                key: "auto-scroll".to_string()
            }
        );
    }

    #[test]
    fn provider_mutations_parse_back() {
        let provider = Provider::new("p1", "Local", ProviderKind::Fim, "codellama");
        let envelope = ClientMessage::SetActiveFimProvider(provider.clone())
            .into_envelope()
            .expect("encode");

        assert_eq!(
            ClientMessage::try_from(&envelope).expect("parse"),
            ClientMessage::SetActiveFimProvider(provider)
        );
    }

    #[test]
    fn keyed_request_without_key_is_rejected() {
        let envelope = ClientEnvelope::new(d::GET_CONFIG_VALUE);
        assert!(ClientMessage::try_from(&envelope).is_err());
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let envelope = ClientEnvelope::new("open-settings");
        assert!(ClientMessage::try_from(&envelope).is_err());
    }
}
