#![deny(unsafe_code)]

/// Webview side of the chat bridge.
///
/// Host state is mirrored through hooks; the chat view owns the transcript
/// and the single streaming turn.
pub mod chat;
/// Host-owned values mirrored over the message channel.
pub mod hooks;
pub mod settings;

pub use chat::{ChatSession, ChatSnapshot, ChatView, StreamState, Viewport};
pub use settings::WebviewSettings;
