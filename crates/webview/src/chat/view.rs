use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use parley_bridge::{ChatMessage, Epoch, MessageChannel, Subscription, discriminant as d};

use crate::hooks::{
    EditorLanguage, HostValue, Providers, Templates, Theme, WorkspaceContext, watch_language,
    watch_selection, watch_theme,
};
use crate::settings::WebviewSettings;

use super::input::InputKey;
use super::scroll::Viewport;
use super::session::{ChatSession, SubmitRejection, is_turn_event};

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSnapshot {
    pub transcript: Vec<ChatMessage>,
    pub scratch: Option<ChatMessage>,
    pub generating: bool,
    pub loading: bool,
    pub input_text: String,
    pub input_disabled: bool,
    pub auto_scroll: bool,
    pub show_providers: bool,
    pub theme: Option<Theme>,
    pub language: Option<EditorLanguage>,
    pub selection: Option<String>,
    pub templates: Vec<String>,
}

/// Mounted chat surface: the session plus every host hook it reads.
///
/// Dropping the view unregisters all of its listeners.
pub struct ChatView {
    channel: MessageChannel,
    session: Arc<Mutex<ChatSession>>,
    theme: HostValue<Theme>,
    language: HostValue<EditorLanguage>,
    selection: HostValue<String>,
    templates: Templates,
    _auto_scroll: WorkspaceContext<bool>,
    _show_providers: WorkspaceContext<bool>,
    _last_conversation: WorkspaceContext<Vec<ChatMessage>>,
    providers: Option<Providers>,
    _turn_events: Subscription,
}

impl ChatView {
    pub fn mount(channel: &MessageChannel, settings: WebviewSettings) -> Self {
        let session = Arc::new(Mutex::new(ChatSession::new(channel.clone(), settings)));

        let weak = Arc::downgrade(&session);
        let turn_events = channel.on_message(is_turn_event, move |envelope| {
            with_live_session(&weak, |session| session.handle_host_event(envelope));
        });

        let weak = Arc::downgrade(&session);
        let selection = watch_selection(channel, move |_| {
            with_live_session(&weak, ChatSession::on_selection_changed);
        });

        let weak = Arc::downgrade(&session);
        let auto_scroll = WorkspaceContext::<bool>::watch_with(
            channel,
            d::context_key::AUTO_SCROLL,
            move |enabled| {
                with_live_session(&weak, |session| session.apply_auto_scroll(**enabled));
            },
        );

        let weak = Arc::downgrade(&session);
        let show_providers = WorkspaceContext::<bool>::watch_with(
            channel,
            d::context_key::SHOW_PROVIDERS,
            move |visible| {
                with_live_session(&weak, |session| session.apply_show_providers(**visible));
            },
        );

        let weak = Arc::downgrade(&session);
        let last_conversation = WorkspaceContext::watch_with(
            channel,
            d::context_key::LAST_CONVERSATION,
            move |messages: &Arc<Vec<ChatMessage>>| {
                with_live_session(&weak, |session| session.restore_conversation(messages));
            },
        );

        tracing::debug!("chat view mounted");

        Self {
            channel: channel.clone(),
            theme: watch_theme(channel),
            language: watch_language(channel),
            selection,
            templates: Templates::watch(channel),
            _auto_scroll: auto_scroll,
            _show_providers: show_providers,
            _last_conversation: last_conversation,
            providers: None,
            _turn_events: turn_events,
            session,
        }
    }

    pub fn with_session<R>(&self, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        f(&mut *self.session.lock())
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let session = self.session.lock();
        ChatSnapshot {
            transcript: session.transcript().to_vec(),
            scratch: session.scratch().cloned(),
            generating: session.is_generating(),
            loading: session.is_loading(),
            input_text: session.input().text().to_string(),
            input_disabled: session.input().is_disabled(),
            auto_scroll: session.auto_scroll(),
            show_providers: session.show_providers(),
            theme: self.theme.get().map(|theme| *theme),
            language: self.language.get().map(|language| (*language).clone()),
            selection: self
                .selection
                .get()
                .map(|selection| (*selection).clone())
                .filter(|selection| !selection.is_empty()),
            templates: self
                .templates
                .get()
                .map(|templates| (*templates).clone())
                .unwrap_or_default(),
        }
    }

    /// Per-frame housekeeping: mounts or drops the provider panel and runs due scrolls.
    pub fn tick(&mut self, now: Instant, viewport: &mut dyn Viewport) -> bool {
        self.sync_provider_panel();
        self.session.lock().apply_pending_scroll(now, viewport)
    }

    pub fn providers(&self) -> Option<&Providers> {
        self.providers.as_ref()
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn set_input_text(&self, text: impl Into<String>) {
        self.session.lock().set_input_text(text);
    }

    pub fn press_key(&self, key: InputKey) -> Option<Result<Epoch, SubmitRejection>> {
        self.session.lock().press_key(key)
    }

    pub fn submit(&self, text: &str) -> Result<Epoch, SubmitRejection> {
        self.session.lock().submit(text)
    }

    pub fn stop(&self) -> bool {
        self.session.lock().stop()
    }

    pub fn toggle_auto_scroll(&self) -> bool {
        self.session.lock().toggle_auto_scroll()
    }

    pub fn toggle_providers(&mut self) -> bool {
        let visible = self.session.lock().toggle_show_providers();
        self.sync_provider_panel();
        visible
    }

    pub fn request_git_changes(&self) {
        self.session.lock().request_git_changes();
    }

    pub fn scroll_to_bottom(&self, viewport: &mut dyn Viewport) {
        self.session.lock().scroll_to_bottom_now(viewport);
    }

    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    fn sync_provider_panel(&mut self) {
        let visible = self.session.lock().show_providers();
        match (visible, self.providers.is_some()) {
            (true, false) => {
                tracing::debug!("mounting provider panel");
                self.providers = Some(Providers::watch(&self.channel));
            }
            (false, true) => {
                tracing::debug!("unmounting provider panel");
                self.providers = None;
            }
            (true, true) | (false, false) => {}
        }
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        tracing::debug!("chat view unmounted");
    }
}

fn with_live_session(session: &Weak<Mutex<ChatSession>>, f: impl FnOnce(&mut ChatSession)) {
    if let Some(session) = session.upgrade() {
        f(&mut *session.lock());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_bridge::{EnvelopeValue, HostEnvelope, RecordingTransport};
    use serde_json::json;

    use super::*;

    struct FakeViewport {
        offset: f32,
        max_offset: f32,
    }

    impl Viewport for FakeViewport {
        fn offset(&self) -> f32 {
            self.offset
        }

        fn max_offset(&self) -> f32 {
            self.max_offset
        }

        fn set_offset(&mut self, offset: f32) {
            self.offset = offset;
        }
    }

    fn mounted() -> (ChatView, MessageChannel, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let channel = MessageChannel::new(transport.clone());
        let view = ChatView::mount(&channel, WebviewSettings::default());
        (view, channel, transport)
    }

    fn workspace_value(key: &str, data: serde_json::Value) -> HostEnvelope {
        HostEnvelope::new(d::keyed(d::WORKSPACE_CONTEXT_VALUE, key)).with_data(data)
    }

    #[test]
    fn mount_requests_each_hook_once() {
        let (_view, _channel, transport) = mounted();
        assert_eq!(transport.count(d::GET_THEME), 1);
        assert_eq!(transport.count(d::GET_LANGUAGE), 1);
        assert_eq!(transport.count(d::GET_SELECTION), 1);
        assert_eq!(transport.count(d::LIST_TEMPLATES), 1);
        assert_eq!(transport.count(d::GET_WORKSPACE_CONTEXT), 3);
        assert_eq!(transport.count(d::GET_ALL_PROVIDERS), 0);
    }

    #[test]
    fn dropping_view_unregisters_every_listener() {
        let (view, channel, _) = mounted();
        assert!(channel.listener_count() > 0);
        drop(view);
        assert_eq!(channel.listener_count(), 0);

        channel.dispatch(
            &HostEnvelope::new(d::COMPLETION_TOKEN).with_value(EnvelopeValue::completion("late")),
        );
    }

    #[test]
    fn workspace_flags_flow_into_session() {
        let (view, channel, _) = mounted();
        channel.dispatch(&workspace_value(d::context_key::AUTO_SCROLL, json!(true)));
        channel.dispatch(&workspace_value(d::context_key::SHOW_PROVIDERS, json!(true)));

        let snapshot = view.snapshot();
        assert!(snapshot.auto_scroll);
        assert!(snapshot.show_providers);
    }

    #[test]
    fn last_conversation_restores_transcript() {
        let (view, channel, _) = mounted();
        channel.dispatch(&workspace_value(
            d::context_key::LAST_CONVERSATION,
            json!([
                { "role": "user", "content": "earlier" },
                { "role": "assistant", "content": "answer" }
            ]),
        ));

        assert_eq!(
            view.snapshot().transcript,
            vec![ChatMessage::user("earlier"), ChatMessage::assistant("answer")]
        );
    }

    #[test]
    fn streamed_turn_is_visible_through_snapshot() {
        let (view, channel, _) = mounted();
        let epoch = view.submit("Hello").expect("submitted");
        assert!(view.snapshot().input_disabled);

        channel.dispatch(
            &HostEnvelope::new(d::COMPLETION_TOKEN)
                .with_value(EnvelopeValue::completion("Hi"))
                .with_epoch(Some(epoch)),
        );
        assert_eq!(
            view.snapshot().scratch.map(|message| message.content),
            Some("Hi".to_string())
        );

        channel.dispatch(
            &HostEnvelope::new(d::COMPLETION_END)
                .with_value(EnvelopeValue::completion("Hi there"))
                .with_epoch(Some(epoch)),
        );
        let snapshot = view.snapshot();
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(snapshot.scratch.is_none());
        assert!(!snapshot.generating);
        assert!(!snapshot.input_disabled);
    }

    #[test]
    fn provider_panel_mounts_lazily() {
        let (mut view, channel, transport) = mounted();
        let base_listeners = channel.listener_count();

        assert!(view.toggle_providers());
        assert!(view.providers().is_some());
        assert_eq!(transport.count(d::GET_ALL_PROVIDERS), 1);
        assert_eq!(channel.listener_count(), base_listeners + 3);

        assert!(!view.toggle_providers());
        assert!(view.providers().is_none());
        assert_eq!(channel.listener_count(), base_listeners);
    }

    #[test]
    fn selection_change_schedules_scroll_with_auto_scroll() {
        let (mut view, channel, _) = mounted();
        channel.dispatch(&workspace_value(d::context_key::AUTO_SCROLL, json!(true)));
        channel.dispatch(
            &HostEnvelope::new(d::SELECTION_CHANGED)
                .with_value(EnvelopeValue::completion("  let x = 1;  ")),
        );

        assert_eq!(view.snapshot().selection.as_deref(), Some("let x = 1;"));
        assert!(view.with_session(|session| session.scroll().is_pending()));

        let mut viewport = FakeViewport {
            offset: 0.0,
            max_offset: 320.0,
        };
        let later = Instant::now() + Duration::from_secs(1);
        assert!(view.tick(later, &mut viewport));
        assert_eq!(viewport.offset(), 320.0);
    }
}
