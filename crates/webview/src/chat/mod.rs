pub mod input;
pub mod scroll;
/// Turn lifecycle and transcript ownership.
pub mod session;
/// Deterministic stream state boundaries.
pub mod stream;
pub mod view;

pub use input::{ChatInput, InputKey, is_submittable};
pub use scroll::{DEFAULT_SCROLL_SETTLE, ScrollManager, Viewport, scroll_to_bottom};
pub use session::{ChatSession, SubmitRejection, TURN_DISCRIMINANTS, is_turn_event};
pub use stream::{StreamState, StreamTransition, StreamTransitionRejection, StreamTransitionResult};
pub use view::{ChatSnapshot, ChatView};
