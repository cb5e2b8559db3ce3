use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parley_bridge::{ChatMessage, Provider, Role};

use crate::error::{HostError, HostResult};

/// Input for one completion run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub history: Vec<ChatMessage>,
    pub provider: Option<Provider>,
}

impl CompletionRequest {
    pub fn last_user_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }
}

/// Produces incremental text deltas for a request.
pub trait CompletionSource: Send + Sync {
    fn stream(&self, request: CompletionRequest) -> BoxStream<'static, HostResult<String>>;
}

/// Replies with the last user message, one word per delta.
#[derive(Debug, Clone, Default)]
pub struct EchoSource;

impl CompletionSource for EchoSource {
    fn stream(&self, request: CompletionRequest) -> BoxStream<'static, HostResult<String>> {
        let model = request
            .provider
            .as_ref()
            .map(|provider| provider.model_name.clone())
            .unwrap_or_else(|| "echo".to_string());
        let reply = match request.last_user_message() {
            Some(text) => format!("[{model}] {text}"),
            None => String::new(),
        };

        stream::iter(split_deltas(&reply).into_iter().map(Ok)).boxed()
    }
}

/// Replays a fixed list of deltas, optionally failing at the end.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    deltas: Vec<String>,
    failure: Option<String>,
}

impl ScriptedSource {
    pub fn new<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

impl CompletionSource for ScriptedSource {
    fn stream(&self, _request: CompletionRequest) -> BoxStream<'static, HostResult<String>> {
        let deltas = self.deltas.clone().into_iter().map(Ok);
        let failure = self.failure.clone().map(|message| {
            Err(HostError::Completion {
                stage: "scripted-source",
                message,
            })
        });
        stream::iter(deltas.chain(failure)).boxed()
    }
}

/// Splits text into word deltas that keep their leading whitespace.
fn split_deltas(text: &str) -> Vec<String> {
    let mut deltas = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() && !current.trim().is_empty() {
            deltas.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        deltas.push(current);
    }
    deltas
}
