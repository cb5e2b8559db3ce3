//! Discriminant strings shared by the webview and the host.
//!
//! These strings are the only compatibility contract of the protocol; there is
//! no version field.

// Client -> host.
pub const GET_SELECTION: &str = "get-selection";
pub const GET_THEME: &str = "get-theme";
pub const GET_LANGUAGE: &str = "get-language";
pub const GET_GLOBAL_CONTEXT: &str = "get-global-context";
pub const GET_WORKSPACE_CONTEXT: &str = "get-workspace-context";
pub const SET_WORKSPACE_CONTEXT: &str = "set-workspace-context";
pub const GET_CONFIG_VALUE: &str = "get-config-value";
pub const LIST_TEMPLATES: &str = "list-templates";
pub const CHAT_MESSAGE: &str = "chat-message";
pub const STOP_GENERATION: &str = "stop-generation";
pub const GET_GIT_CHANGES: &str = "get-git-changes";
pub const GET_ALL_PROVIDERS: &str = "get-all-providers";
pub const GET_ACTIVE_CHAT_PROVIDER: &str = "get-active-chat-provider";
pub const GET_ACTIVE_FIM_PROVIDER: &str = "get-active-fim-provider";
pub const ADD_PROVIDER: &str = "add-provider";
pub const UPDATE_PROVIDER: &str = "update-provider";
pub const REMOVE_PROVIDER: &str = "remove-provider";
pub const COPY_PROVIDER: &str = "copy-provider";
pub const RESET_PROVIDERS: &str = "reset-providers";
pub const SET_ACTIVE_CHAT_PROVIDER: &str = "set-active-chat-provider";
pub const SET_ACTIVE_FIM_PROVIDER: &str = "set-active-fim-provider";

// Host -> client.
pub const THEME_CHANGED: &str = "theme-changed";
pub const LANGUAGE_CHANGED: &str = "language-changed";
pub const SELECTION_CHANGED: &str = "selection-changed";
pub const COMPLETION_TOKEN: &str = "completion-token";
pub const COMPLETION_END: &str = "completion-end";
pub const LOADING_STARTED: &str = "loading-started";
pub const GENERATION_STOPPED: &str = "generation-stopped";
pub const ADD_MESSAGE: &str = "add-message";
pub const WORKSPACE_CONTEXT_VALUE: &str = "workspace-context-value";
pub const GLOBAL_CONTEXT_VALUE: &str = "global-context-value";
pub const CONFIG_VALUE: &str = "config-value";
pub const PROVIDERS_ALL: &str = "providers-all";
pub const PROVIDER_ACTIVE_CHAT: &str = "provider-active-chat";
pub const PROVIDER_ACTIVE_FIM: &str = "provider-active-fim";
pub const TEMPLATE_LIST: &str = "template-list";

/// Workspace context keys owned by the host and mirrored by the webview.
pub mod context_key {
    pub const LAST_CONVERSATION: &str = "last-conversation";
    pub const AUTO_SCROLL: &str = "auto-scroll";
    pub const SHOW_PROVIDERS: &str = "show-providers";
    pub const SELECTED_TEMPLATES: &str = "selected-templates";
}

/// Builds a key-suffixed reply discriminant such as `workspace-context-value-auto-scroll`.
pub fn keyed(base: &str, key: &str) -> String {
    format!("{base}-{key}")
}
