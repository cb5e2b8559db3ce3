/// Host-owned state mirrored into the webview.
///
/// Every hook is a [`HostValue`] keyed by one reply discriminant.
pub mod config;
pub mod context;
pub mod editor;
pub mod host_value;
pub mod providers;
pub mod templates;

pub use config::{ConfigSetting, ConfigValue};
pub use context::{GlobalContext, WorkspaceContext, persist_workspace_value};
pub use editor::{EditorLanguage, Theme, watch_language, watch_selection, watch_theme};
pub use host_value::{HostValue, data_decoder};
pub use providers::Providers;
pub use templates::Templates;
