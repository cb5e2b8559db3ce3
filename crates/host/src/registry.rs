use std::collections::BTreeMap;

use parley_bridge::{Provider, ProviderKind, ProviderMap};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ensure};

use crate::error::{
    DuplicateProviderSnafu, HostResult, ProviderKindMismatchSnafu, ProviderNotFoundSnafu,
};

pub const DEFAULT_CHAT_PROVIDER_ID: &str = "default-chat";
pub const DEFAULT_FIM_PROVIDER_ID: &str = "default-fim";

/// Provider registry with at most one active provider per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRegistry {
    providers: ProviderMap,
    active: BTreeMap<ProviderKind, String>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let chat = Provider::new(
            DEFAULT_CHAT_PROVIDER_ID,
            "Ollama chat",
            ProviderKind::Chat,
            "llama3.1",
        );
        let fim = Provider::new(
            DEFAULT_FIM_PROVIDER_ID,
            "Ollama FIM",
            ProviderKind::Fim,
            "codellama:7b-code",
        );

        let mut registry = Self {
            providers: ProviderMap::new(),
            active: BTreeMap::new(),
        };
        for provider in [chat, fim] {
            registry
                .active
                .insert(provider.kind, provider.id.clone());
            registry.providers.insert(provider.id.clone(), provider);
        }
        registry
    }
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: ProviderMap::new(),
            active: BTreeMap::new(),
        }
    }

    pub fn all(&self) -> &ProviderMap {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn active(&self, kind: ProviderKind) -> Option<&Provider> {
        self.active.get(&kind).and_then(|id| self.providers.get(id))
    }

    /// Inserts a new provider. An empty id gets a fresh one.
    pub fn add(&mut self, mut provider: Provider) -> HostResult<Provider> {
        if provider.id.trim().is_empty() {
            provider.id = uuid::Uuid::new_v4().to_string();
        }
        ensure!(
            !self.providers.contains_key(&provider.id),
            DuplicateProviderSnafu {
                stage: "registry-add",
                id: provider.id.clone(),
            }
        );

        self.providers.insert(provider.id.clone(), provider.clone());
        Ok(provider)
    }

    /// Replaces an existing provider. A kind change drops its active slot.
    pub fn update(&mut self, provider: Provider) -> HostResult<()> {
        let existing = self
            .providers
            .get_mut(&provider.id)
            .context(ProviderNotFoundSnafu {
                stage: "registry-update",
                id: provider.id.clone(),
            })?;

        let previous_kind = existing.kind;
        *existing = provider;
        if self.active.get(&previous_kind) == Some(&existing.id) && previous_kind != existing.kind
        {
            self.active.remove(&previous_kind);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> HostResult<Provider> {
        let removed = self.providers.remove(id).context(ProviderNotFoundSnafu {
            stage: "registry-remove",
            id: id.to_string(),
        })?;
        self.active.retain(|_, active_id| active_id != id);
        Ok(removed)
    }

    /// Duplicates a provider under a fresh id.
    pub fn copy(&mut self, id: &str) -> HostResult<Provider> {
        let mut copy = self
            .providers
            .get(id)
            .cloned()
            .context(ProviderNotFoundSnafu {
                stage: "registry-copy",
                id: id.to_string(),
            })?;
        copy.id = uuid::Uuid::new_v4().to_string();
        copy.label = format!("{} (copy)", copy.label);
        self.add(copy)
    }

    /// Marks `id` as the active provider of `kind`, replacing the previous one.
    pub fn set_active(&mut self, kind: ProviderKind, id: &str) -> HostResult<()> {
        let provider = self.providers.get(id).context(ProviderNotFoundSnafu {
            stage: "registry-set-active",
            id: id.to_string(),
        })?;
        ensure!(
            provider.kind == kind,
            ProviderKindMismatchSnafu {
                stage: "registry-set-active",
                id: id.to_string(),
                expected: kind,
            }
        );

        self.active.insert(kind, id.to_string());
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of active providers of `kind`. Never more than one.
    pub fn active_count(&self, kind: ProviderKind) -> usize {
        usize::from(self.active(kind).is_some())
    }
}
