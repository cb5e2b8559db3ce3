use std::sync::Arc;

use parley_bridge::{
    ClientMessage, MessageChannel, Provider, ProviderKind, ProviderMap, discriminant as d,
    providers_of_kind,
};

use super::host_value::{HostValue, data_decoder};

/// Mirror of the host provider registry plus its mutation commands.
///
/// Mutations are fire-and-forget; the host answers with fresh snapshots.
pub struct Providers {
    channel: MessageChannel,
    all: HostValue<ProviderMap>,
    active_chat: HostValue<Provider>,
    active_fim: HostValue<Provider>,
}

impl Providers {
    pub fn watch(channel: &MessageChannel) -> Self {
        Self {
            channel: channel.clone(),
            all: HostValue::watch(
                channel,
                ClientMessage::GetAllProviders,
                d::PROVIDERS_ALL,
                data_decoder(),
            ),
            active_chat: HostValue::watch(
                channel,
                ClientMessage::GetActiveChatProvider,
                d::PROVIDER_ACTIVE_CHAT,
                data_decoder(),
            ),
            active_fim: HostValue::watch(
                channel,
                ClientMessage::GetActiveFimProvider,
                d::PROVIDER_ACTIVE_FIM,
                data_decoder(),
            ),
        }
    }

    pub fn all(&self) -> Arc<ProviderMap> {
        self.all.get().unwrap_or_default()
    }

    pub fn active_chat(&self) -> Option<Arc<Provider>> {
        self.active_chat.get()
    }

    pub fn active_fim(&self) -> Option<Arc<Provider>> {
        self.active_fim.get()
    }

    pub fn of_kind(&self, kind: ProviderKind) -> Vec<Provider> {
        providers_of_kind(&self.all(), kind)
    }

    pub fn add(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::AddProvider(provider));
    }

    pub fn copy(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::CopyProvider(provider));
    }

    pub fn update(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::UpdateProvider(provider));
    }

    pub fn remove(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::RemoveProvider(provider));
    }

    pub fn set_active_chat(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::SetActiveChatProvider(provider));
    }

    pub fn set_active_fim(&self, provider: Provider) {
        self.channel.send_message(ClientMessage::SetActiveFimProvider(provider));
    }

    pub fn reset(&self) {
        self.channel.send_message(ClientMessage::ResetProviders);
    }
}
