use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parley_bridge::{
    ChatMessage, ClientEnvelope, ClientMessage, EnvelopeValue, Epoch, HostEndpoint, HostEnvelope,
    ProviderKind, discriminant as d,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::completion::{CompletionRequest, CompletionSource, EchoSource};
use crate::context_store::{ContextScope, ContextStore};
use crate::error::HostResult;
use crate::registry::ProviderRegistry;
use crate::settings::HostSettings;

/// Global context key holding the serialized provider registry.
pub const PROVIDERS_CONTEXT_KEY: &str = "providers";

const COMMIT_PROMPT: &str = "Generate a commit message for these staged changes:";

struct ActiveTurn {
    epoch: Option<Epoch>,
    cancel: Option<oneshot::Sender<()>>,
    worker: JoinHandle<()>,
}

impl ActiveTurn {
    fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

/// In-process host that answers every webview request.
pub struct ReferenceHost {
    settings: HostSettings,
    context: ContextStore,
    providers: ProviderRegistry,
    source: Arc<dyn CompletionSource>,
    active: Option<ActiveTurn>,
}

impl ReferenceHost {
    pub fn new(settings: HostSettings) -> Self {
        let context = match &settings.state_path {
            Some(path) => ContextStore::open_or_default(path),
            None => ContextStore::in_memory(),
        };
        Self::with_context(settings, context)
    }

    pub fn with_context(settings: HostSettings, context: ContextStore) -> Self {
        let providers = context
            .get(ContextScope::Global, PROVIDERS_CONTEXT_KEY)
            .cloned()
            .and_then(|value| match serde_json::from_value(value) {
                Ok(registry) => Some(registry),
                Err(error) => {
                    tracing::warn!(error = %error, "stored provider registry is invalid, using defaults");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            settings,
            context,
            providers,
            source: Arc::new(EchoSource),
            active: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn CompletionSource>) -> Self {
        self.source = source;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Serves requests until the webview side closes.
    pub async fn run(mut self, endpoint: HostEndpoint) {
        let HostEndpoint {
            mut requests,
            events,
        } = endpoint;
        tracing::info!("reference host started");

        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    self.handle(&request, &events);
                }
                _ = events.closed() => break,
            }
        }

        self.cancel_active();
        tracing::info!("reference host stopped");
    }

    /// Handles one client envelope, emitting replies on `events`.
    pub fn handle(&mut self, envelope: &ClientEnvelope, events: &mpsc::UnboundedSender<HostEnvelope>) {
        let message = match ClientMessage::try_from(envelope) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(discriminant = %envelope.kind, error = %error, "rejected client envelope");
                return;
            }
        };
        tracing::debug!(discriminant = %envelope.kind, "host received request");

        let emit = |reply: HostEnvelope| {
            if events.send(reply).is_err() {
                tracing::debug!("webview closed before reply");
            }
        };

        match message {
            ClientMessage::GetSelection => emit(
                HostEnvelope::new(d::SELECTION_CHANGED)
                    .with_value(EnvelopeValue::completion(self.settings.selection.clone())),
            ),
            ClientMessage::GetTheme => emit(
                HostEnvelope::new(d::THEME_CHANGED)
                    .with_data(Value::String(self.settings.theme.clone())),
            ),
            ClientMessage::GetLanguage => {
                emit(HostEnvelope::new(d::LANGUAGE_CHANGED).with_data(self.settings.language()))
            }
            ClientMessage::GetGlobalContext { key } => emit(keyed_reply(
                d::GLOBAL_CONTEXT_VALUE,
                &key,
                self.context.get(ContextScope::Global, &key).cloned(),
            )),
            ClientMessage::GetWorkspaceContext { key } => emit(keyed_reply(
                d::WORKSPACE_CONTEXT_VALUE,
                &key,
                self.context.get(ContextScope::Workspace, &key).cloned(),
            )),
            ClientMessage::SetWorkspaceContext { key, value } => {
                if let Err(error) = self.context.set(ContextScope::Workspace, &key, value) {
                    tracing::error!(key = %key, error = %error, "failed to persist workspace context");
                }
            }
            ClientMessage::GetConfigValue { key } => emit(keyed_reply(
                d::CONFIG_VALUE,
                &key,
                self.settings.config.get(&key).cloned(),
            )),
            ClientMessage::ListTemplates => {
                emit(HostEnvelope::new(d::TEMPLATE_LIST).with_data(to_data(&self.settings.templates)))
            }
            ClientMessage::Chat { history, epoch } => self.start_turn(history, Some(epoch), events),
            ClientMessage::StopGeneration { epoch } => self.stop_turn(epoch, events),
            ClientMessage::GetGitChanges => self.start_commit_turn(events),
            ClientMessage::GetAllProviders => emit(self.providers_all()),
            ClientMessage::GetActiveChatProvider => emit(self.provider_active(ActiveSlot::Chat)),
            ClientMessage::GetActiveFimProvider => emit(self.provider_active(ActiveSlot::Fim)),
            ClientMessage::AddProvider(provider) => {
                let result = self.providers.add(provider).map(|_| ());
                self.after_provider_change("add-provider", result, events);
            }
            ClientMessage::UpdateProvider(provider) => {
                let result = self.providers.update(provider);
                self.after_provider_change("update-provider", result, events);
            }
            ClientMessage::RemoveProvider(provider) => {
                let result = self.providers.remove(&provider.id).map(|_| ());
                self.after_provider_change("remove-provider", result, events);
            }
            ClientMessage::CopyProvider(provider) => {
                let result = self.providers.copy(&provider.id).map(|_| ());
                self.after_provider_change("copy-provider", result, events);
            }
            ClientMessage::ResetProviders => {
                self.providers.reset();
                self.after_provider_change("reset-providers", Ok(()), events);
            }
            ClientMessage::SetActiveChatProvider(provider) => {
                let result = self.providers.set_active(ProviderKind::Chat, &provider.id);
                self.after_provider_change("set-active-chat-provider", result, events);
            }
            ClientMessage::SetActiveFimProvider(provider) => {
                let result = self.providers.set_active(ProviderKind::Fim, &provider.id);
                self.after_provider_change("set-active-fim-provider", result, events);
            }
        }
    }

    fn start_turn(
        &mut self,
        history: Vec<ChatMessage>,
        epoch: Option<Epoch>,
        events: &mpsc::UnboundedSender<HostEnvelope>,
    ) {
        self.cancel_active();
        let _ = events.send(HostEnvelope::new(d::LOADING_STARTED).with_epoch(epoch));

        let request = CompletionRequest {
            history,
            provider: self.providers.active(ProviderKind::Chat).cloned(),
        };
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let worker = tokio::spawn(run_completion(
            Arc::clone(&self.source),
            request,
            epoch,
            events.clone(),
            cancel_rx,
            self.settings.token_interval(),
        ));

        tracing::debug!(epoch = ?epoch, "completion turn started");
        self.active = Some(ActiveTurn {
            epoch,
            cancel: Some(cancel_tx),
            worker,
        });
    }

    /// Host-initiated turn: announces the prompt, then streams untagged.
    fn start_commit_turn(&mut self, events: &mpsc::UnboundedSender<HostEnvelope>) {
        let diff = self.settings.staged_diff.trim();
        if diff.is_empty() {
            tracing::info!("no staged changes, skipping commit message turn");
            return;
        }

        let prompt = format!("{COMMIT_PROMPT}\n\n{diff}");
        let _ = events.send(
            HostEnvelope::new(d::ADD_MESSAGE).with_value(EnvelopeValue::completion(prompt.clone())),
        );
        self.start_turn(vec![ChatMessage::user(prompt)], None, events);
    }

    fn stop_turn(&mut self, epoch: Option<Epoch>, events: &mpsc::UnboundedSender<HostEnvelope>) {
        let Some(active) = self.active.as_ref().filter(|active| active.is_running()) else {
            tracing::debug!(epoch = ?epoch, "stop requested with no running turn");
            return;
        };
        if let (Some(requested), Some(running)) = (epoch, active.epoch)
            && requested != running
        {
            tracing::debug!(requested = ?requested, running = ?running, "ignoring stop for another turn");
            return;
        }

        let stopped_epoch = active.epoch;
        self.cancel_active();
        let _ = events.send(HostEnvelope::new(d::GENERATION_STOPPED).with_epoch(stopped_epoch));
        tracing::debug!(epoch = ?stopped_epoch, "completion turn stopped");
    }

    fn cancel_active(&mut self) {
        if let Some(mut active) = self.active.take()
            && let Some(cancel) = active.cancel.take()
        {
            let _ = cancel.send(());
        }
    }

    fn after_provider_change(
        &mut self,
        operation: &'static str,
        result: HostResult<()>,
        events: &mpsc::UnboundedSender<HostEnvelope>,
    ) {
        if let Err(error) = result {
            tracing::warn!(operation, error = %error, "provider operation failed");
            return;
        }

        match serde_json::to_value(&self.providers) {
            Ok(value) => {
                if let Err(error) = self
                    .context
                    .set(ContextScope::Global, PROVIDERS_CONTEXT_KEY, value)
                {
                    tracing::error!(operation, error = %error, "failed to persist providers");
                }
            }
            Err(error) => {
                tracing::error!(operation, error = %error, "failed to serialize providers");
            }
        }

        for reply in [
            self.providers_all(),
            self.provider_active(ActiveSlot::Chat),
            self.provider_active(ActiveSlot::Fim),
        ] {
            let _ = events.send(reply);
        }
    }

    fn providers_all(&self) -> HostEnvelope {
        HostEnvelope::new(d::PROVIDERS_ALL).with_data(to_data(self.providers.all()))
    }

    fn provider_active(&self, slot: ActiveSlot) -> HostEnvelope {
        let reply = HostEnvelope::new(slot.discriminant());
        match self.providers.active(slot.kind()) {
            Some(provider) => reply.with_data(to_data(provider)),
            None => reply,
        }
    }
}

/// Provider kinds the webview can query the active provider of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveSlot {
    Chat,
    Fim,
}

impl ActiveSlot {
    fn kind(self) -> ProviderKind {
        match self {
            Self::Chat => ProviderKind::Chat,
            Self::Fim => ProviderKind::Fim,
        }
    }

    fn discriminant(self) -> &'static str {
        match self {
            Self::Chat => d::PROVIDER_ACTIVE_CHAT,
            Self::Fim => d::PROVIDER_ACTIVE_FIM,
        }
    }
}

fn keyed_reply(base: &str, key: &str, value: Option<Value>) -> HostEnvelope {
    let reply = HostEnvelope {
        key: Some(key.to_string()),
        ..HostEnvelope::new(d::keyed(base, key))
    };
    match value {
        Some(value) => reply.with_data(value),
        None => reply,
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|error| {
        tracing::error!(error = %error, "failed to serialize reply payload");
        Value::Null
    })
}

/// Streams cumulative snapshots until the source ends or `cancel` fires.
async fn run_completion(
    source: Arc<dyn CompletionSource>,
    request: CompletionRequest,
    epoch: Option<Epoch>,
    events: mpsc::UnboundedSender<HostEnvelope>,
    mut cancel: oneshot::Receiver<()>,
    interval: Duration,
) {
    let mut stream = source.stream(request);
    let mut completion = String::new();

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                tracing::debug!(epoch = ?epoch, "completion worker cancelled");
                return;
            }
            next = stream.next() => match next {
                Some(Ok(delta)) => {
                    completion.push_str(&delta);
                    let token = HostEnvelope::new(d::COMPLETION_TOKEN)
                        .with_value(EnvelopeValue::completion(completion.clone()))
                        .with_epoch(epoch);
                    if events.send(token).is_err() {
                        return;
                    }
                }
                Some(Err(error)) => {
                    tracing::warn!(epoch = ?epoch, error = %error, "completion source failed");
                    let value = EnvelopeValue {
                        completion: Some(completion),
                        ..EnvelopeValue::error(error.to_string())
                    };
                    let _ = events.send(
                        HostEnvelope::new(d::COMPLETION_END)
                            .with_value(value)
                            .with_epoch(epoch),
                    );
                    return;
                }
                None => break,
            }
        }

        if !interval.is_zero() {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::debug!(epoch = ?epoch, "completion worker cancelled");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    let end = if completion.is_empty() {
        HostEnvelope::new(d::COMPLETION_END)
    } else {
        HostEnvelope::new(d::COMPLETION_END).with_value(EnvelopeValue::completion(completion))
    };
    let _ = events.send(end.with_epoch(epoch));
}
