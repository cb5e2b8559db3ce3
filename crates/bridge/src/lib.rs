#![deny(unsafe_code)]

/// Message channel between the webview and its host.
///
/// This crate owns the wire envelopes, the discriminant contract and the
/// listener registry. It knows nothing about chat state.
pub mod channel;
pub mod client;
pub mod discriminant;
pub mod envelope;
pub mod error;
/// Chat transcript entries exchanged with the host.
pub mod message;
pub mod provider;
pub mod transport;

pub use channel::{ListenerId, MessageChannel, Subscription};
pub use client::ClientMessage;
pub use envelope::{ClientEnvelope, EnvelopeValue, Epoch, HostEnvelope};
pub use error::{BridgeError, BridgeResult};
pub use message::{ChatMessage, Role};
pub use provider::{Provider, ProviderKind, ProviderMap, providers_of_kind};
pub use transport::{
    HostEndpoint, Loopback, LoopbackTransport, RecordingTransport, Transport, loopback,
};
