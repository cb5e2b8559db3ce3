#![deny(unsafe_code)]

/// Reference host for the webview chat bridge.
///
/// Answers every client request in-process, owns the persisted key/value
/// context and the provider registry, and streams cumulative completions.
pub mod completion;
pub mod context_store;
pub mod error;
pub mod host;
/// Provider registry with one active provider per kind.
pub mod registry;
pub mod settings;

pub use completion::{CompletionRequest, CompletionSource, EchoSource, ScriptedSource};
pub use context_store::{ContextScope, ContextStore};
pub use error::{HostError, HostResult};
pub use host::{PROVIDERS_CONTEXT_KEY, ReferenceHost};
pub use registry::ProviderRegistry;
pub use settings::HostSettings;
