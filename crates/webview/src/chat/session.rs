use std::time::Instant;

use parley_bridge::{
    ChatMessage, ClientMessage, Epoch, HostEnvelope, MessageChannel, discriminant as d,
};

use crate::hooks::persist_workspace_value;
use crate::settings::WebviewSettings;

use super::input::{ChatInput, InputKey, is_submittable};
use super::scroll::{ScrollManager, Viewport, scroll_to_bottom};
use super::stream::{StreamState, StreamTransition};

/// Host discriminants that drive the turn lifecycle.
pub const TURN_DISCRIMINANTS: [&str; 5] = [
    d::COMPLETION_TOKEN,
    d::COMPLETION_END,
    d::LOADING_STARTED,
    d::GENERATION_STOPPED,
    d::ADD_MESSAGE,
];

pub fn is_turn_event(envelope: &HostEnvelope) -> bool {
    TURN_DISCRIMINANTS.contains(&envelope.kind.as_str())
}

/// Why a submission was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    Blank,
    Generating,
}

/// Transcript, scratch entry and turn lifecycle of one chat view.
///
/// Only this type writes the scratch slot, so at most one streaming turn exists.
pub struct ChatSession {
    channel: MessageChannel,
    settings: WebviewSettings,
    transcript: Vec<ChatMessage>,
    scratch: Option<ChatMessage>,
    stream: StreamState,
    last_epoch: Epoch,
    host_loading: bool,
    auto_scroll: bool,
    show_providers: bool,
    input: ChatInput,
    scroll: ScrollManager,
}

impl ChatSession {
    pub fn new(channel: MessageChannel, settings: WebviewSettings) -> Self {
        let scroll = ScrollManager::new(settings.scroll_settle());
        Self {
            channel,
            settings,
            transcript: Vec::new(),
            scratch: None,
            stream: StreamState::Idle,
            last_epoch: Epoch::default(),
            host_loading: false,
            auto_scroll: false,
            show_providers: false,
            input: ChatInput::new(),
            scroll,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn scratch(&self) -> Option<&ChatMessage> {
        self.scratch.as_ref()
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream
    }

    pub fn is_generating(&self) -> bool {
        self.stream.is_generating()
    }

    pub fn is_loading(&self) -> bool {
        self.stream.is_loading() || self.host_loading
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn show_providers(&self) -> bool {
        self.show_providers
    }

    pub fn input(&self) -> &ChatInput {
        &self.input
    }

    pub fn scroll(&self) -> &ScrollManager {
        &self.scroll
    }

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
    }

    /// Routes a key press from the chat box; Enter submits the box contents.
    ///
    /// Returns `None` when the key only edits the text and no submit was attempted.
    pub fn press_key(&mut self, key: InputKey) -> Option<Result<Epoch, SubmitRejection>> {
        self.sync_input();
        match (key, self.input.handle_key(key)) {
            (InputKey::CtrlEnter, _) => None,
            (InputKey::Enter, Some(text)) => Some(self.submit(&text)),
            (InputKey::Enter, None) if self.is_generating() => {
                Some(Err(SubmitRejection::Generating))
            }
            (InputKey::Enter, None) => Some(Err(SubmitRejection::Blank)),
        }
    }

    /// Starts a user turn: appends optimistically and sends the whole history.
    pub fn submit(&mut self, text: &str) -> Result<Epoch, SubmitRejection> {
        if !is_submittable(text) {
            return Err(SubmitRejection::Blank);
        }
        if self.is_generating() {
            return Err(SubmitRejection::Generating);
        }

        let epoch = self.begin_turn().ok_or(SubmitRejection::Generating)?;
        self.transcript.push(ChatMessage::user(text));
        self.channel.send_message(ClientMessage::Chat {
            history: self.transcript.clone(),
            epoch,
        });
        tracing::debug!(epoch = ?epoch, history_len = self.transcript.len(), "submitted chat turn");

        self.request_auto_scroll();
        Ok(epoch)
    }

    /// Cancels the live turn. Returns false when nothing was generating.
    pub fn stop(&mut self) -> bool {
        let Some(epoch) = self.stream.live_epoch() else {
            return false;
        };

        self.channel.send_message(ClientMessage::StopGeneration { epoch: Some(epoch) });
        self.enter_stopped();
        tracing::debug!(epoch = ?epoch, "user stopped generation");
        true
    }

    /// Applies one inbound turn envelope. Other discriminants are ignored.
    pub fn handle_host_event(&mut self, envelope: &HostEnvelope) {
        match envelope.kind.as_str() {
            d::COMPLETION_TOKEN => self.on_token(envelope),
            d::COMPLETION_END => self.on_end(envelope),
            d::LOADING_STARTED => self.on_loading(envelope),
            d::GENERATION_STOPPED => self.on_host_stopped(envelope),
            d::ADD_MESSAGE => self.on_add_message(envelope),
            _ => {}
        }
    }

    /// Replaces the transcript with the host's last conversation while idle.
    pub fn restore_conversation(&mut self, messages: &[ChatMessage]) {
        if !self.settings.restore_conversation {
            return;
        }
        if self.is_generating() || self.scratch.is_some() {
            tracing::debug!("skipping conversation restore during an active turn");
            return;
        }

        self.transcript = messages.to_vec();
        self.request_auto_scroll();
    }

    pub fn apply_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }

    pub fn apply_show_providers(&mut self, visible: bool) {
        self.show_providers = visible;
    }

    /// Flips auto-scroll locally and persists the new value.
    pub fn toggle_auto_scroll(&mut self) -> bool {
        self.auto_scroll = !self.auto_scroll;
        persist_workspace_value(&self.channel, d::context_key::AUTO_SCROLL, &self.auto_scroll);
        if self.auto_scroll {
            self.scroll.request_scroll_to_bottom(Instant::now());
        }
        self.auto_scroll
    }

    /// Flips provider-panel visibility locally and persists the new value.
    pub fn toggle_show_providers(&mut self) -> bool {
        self.show_providers = !self.show_providers;
        persist_workspace_value(
            &self.channel,
            d::context_key::SHOW_PROVIDERS,
            &self.show_providers,
        );
        self.show_providers
    }

    /// Asks the host for a commit-message turn. A stopped session is re-armed
    /// so the host-initiated envelopes that follow are accepted.
    pub fn request_git_changes(&mut self) {
        if self.stream.is_stopped() {
            self.stream = StreamState::Idle;
        }
        self.channel.send_message(ClientMessage::GetGitChanges);
    }

    /// Selection changes scroll the transcript so the suggestion strip stays visible.
    pub fn on_selection_changed(&mut self) {
        self.request_auto_scroll();
    }

    pub fn scroll_to_bottom_now(&mut self, viewport: &mut dyn Viewport) {
        self.scroll.cancel();
        scroll_to_bottom(viewport);
    }

    pub fn apply_pending_scroll(&mut self, now: Instant, viewport: &mut dyn Viewport) -> bool {
        self.scroll.apply_pending_scroll(now, viewport)
    }

    fn on_token(&mut self, envelope: &HostEnvelope) {
        let Some(epoch) = self.resolve_epoch(envelope) else {
            return;
        };

        match self.stream.apply(StreamTransition::Token(epoch)) {
            Ok(next) => {
                self.stream = next;
                self.host_loading = false;
                // Tokens are cumulative snapshots: replace, never append.
                self.scratch = Some(completion_message(envelope));
                self.sync_input();
                self.request_auto_scroll();
            }
            Err(rejection) => {
                tracing::debug!(?rejection, epoch = ?epoch, "dropping stale completion token");
            }
        }
    }

    fn on_end(&mut self, envelope: &HostEnvelope) {
        let Some(epoch) = self.resolve_epoch(envelope) else {
            return;
        };

        let finalizing = match self.stream.apply(StreamTransition::End(epoch)) {
            Ok(next) => next,
            Err(rejection) => {
                tracing::debug!(?rejection, epoch = ?epoch, "dropping stale completion end");
                return;
            }
        };
        self.stream = finalizing;

        let scratch = self.scratch.take();
        let has_payload = envelope.value.as_ref().is_some_and(|value| !value.is_empty());
        if has_payload {
            let mut message = completion_message(envelope);
            if let Some(scratch) = scratch {
                message.kind = message.kind.or(scratch.kind);
                message.language = message.language.or(scratch.language);
                message.error = message.error.or(scratch.error);
            }
            self.transcript.push(message);
            self.persist_conversation();
            self.request_auto_scroll();
        }

        self.host_loading = false;
        self.stream = self
            .stream
            .apply(StreamTransition::Settle)
            .unwrap_or(StreamState::Idle);
        self.sync_input();
        tracing::debug!(epoch = ?epoch, committed = has_payload, "completion finished");
    }

    fn on_loading(&mut self, envelope: &HostEnvelope) {
        if self.drop_after_stop(envelope) {
            return;
        }
        match envelope.epoch {
            Some(epoch) if !self.stream.accepts(epoch) => {
                tracing::debug!(epoch = ?epoch, "ignoring loading signal for a stale turn");
                return;
            }
            Some(_) => {}
            // An untagged loading signal while idle starts a host-initiated turn.
            None if !self.is_generating() => {
                self.begin_turn();
            }
            None => {}
        }

        self.host_loading = true;
        self.sync_input();
        self.request_auto_scroll();
    }

    fn on_host_stopped(&mut self, envelope: &HostEnvelope) {
        if let Some(epoch) = envelope.epoch
            && !self.stream.accepts(epoch)
        {
            return;
        }
        if self.is_generating() {
            self.enter_stopped();
        }
        self.host_loading = false;
    }

    fn on_add_message(&mut self, envelope: &HostEnvelope) {
        if self.drop_after_stop(envelope) {
            return;
        }
        if let Some(epoch) = envelope.epoch
            && !self.stream.accepts(epoch)
        {
            tracing::debug!(epoch = ?epoch, "ignoring add-message for a stale turn");
            return;
        }

        let content = envelope.completion().unwrap_or_default();
        if !is_submittable(content) {
            return;
        }

        if !self.is_generating() {
            self.begin_turn();
        }
        self.host_loading = false;
        self.transcript.push(ChatMessage::user(content));
        self.sync_input();
        self.request_auto_scroll();
    }

    /// True when the session is stopped; the envelope is dropped and the input re-enabled.
    ///
    /// Only a user submit or an explicit git-changes request leaves `Stopped`.
    fn drop_after_stop(&mut self, envelope: &HostEnvelope) -> bool {
        if !self.stream.is_stopped() {
            return false;
        }
        tracing::debug!(discriminant = %envelope.kind, "dropping envelope after stop");
        self.host_loading = false;
        self.sync_input();
        true
    }

    /// Maps an inbound envelope to the epoch it belongs to.
    ///
    /// Tagged envelopes carry their own epoch. Untagged ones join the live
    /// turn, open a host-initiated turn when idle, and are dropped after a stop.
    fn resolve_epoch(&mut self, envelope: &HostEnvelope) -> Option<Epoch> {
        if let Some(epoch) = envelope.epoch {
            return Some(epoch);
        }

        match self.stream {
            StreamState::Loading(epoch) | StreamState::Streaming(epoch) => Some(epoch),
            StreamState::Stopped(_) => {
                tracing::debug!(discriminant = %envelope.kind, "dropping envelope after stop");
                self.sync_input();
                None
            }
            StreamState::Idle | StreamState::Finalizing(_) => self.begin_turn(),
        }
    }

    fn begin_turn(&mut self) -> Option<Epoch> {
        let epoch = self.last_epoch.next();
        match self.stream.apply(StreamTransition::Begin(epoch)) {
            Ok(next) => {
                self.stream = next;
                self.last_epoch = epoch;
                self.scratch = None;
                self.sync_input();
                Some(epoch)
            }
            Err(rejection) => {
                tracing::warn!(?rejection, "cannot begin a new turn");
                None
            }
        }
    }

    fn enter_stopped(&mut self) {
        if let Ok(next) = self.stream.apply(StreamTransition::Stop) {
            self.stream = next;
        }
        self.scratch = None;
        self.host_loading = false;
        self.sync_input();
    }

    fn persist_conversation(&self) {
        if !self.settings.persist_conversation {
            return;
        }
        persist_workspace_value(
            &self.channel,
            d::context_key::LAST_CONVERSATION,
            &self.transcript,
        );
    }

    fn request_auto_scroll(&mut self) {
        if self.auto_scroll {
            self.scroll.request_scroll_to_bottom(Instant::now());
        }
    }

    fn sync_input(&mut self) {
        let generating = self.is_generating();
        self.input.set_disabled(generating);
    }
}

/// Builds the assistant entry carried by a token or end envelope.
fn completion_message(envelope: &HostEnvelope) -> ChatMessage {
    let mut message = ChatMessage::assistant(envelope.completion().unwrap_or_default());
    if let Some(value) = &envelope.value {
        message.kind = value.kind.clone();
        message.language = value
            .data
            .as_ref()
            .and_then(|data| data.as_str())
            .map(str::to_string);
        message.error = value.error.clone();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parley_bridge::{EnvelopeValue, RecordingTransport, Role};
    use serde_json::json;

    use super::*;

    fn session() -> (ChatSession, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let channel = MessageChannel::new(transport.clone());
        (
            ChatSession::new(channel, WebviewSettings::default()),
            transport,
        )
    }

    fn token(text: &str) -> HostEnvelope {
        HostEnvelope::new(d::COMPLETION_TOKEN).with_value(EnvelopeValue::completion(text))
    }

    fn end(text: &str) -> HostEnvelope {
        HostEnvelope::new(d::COMPLETION_END).with_value(EnvelopeValue::completion(text))
    }

    fn tagged(envelope: HostEnvelope, epoch: Epoch) -> HostEnvelope {
        envelope.with_epoch(Some(epoch))
    }

    #[test]
    fn hello_turn_commits_one_assistant_message() {
        let (mut session, transport) = session();
        let epoch = session.submit("Hello").expect("submitted");

        session.handle_host_event(&tagged(token("Hel"), epoch));
        assert_eq!(session.scratch().map(|m| m.content.as_str()), Some("Hel"));
        session.handle_host_event(&tagged(token("Hello"), epoch));
        assert_eq!(session.scratch().map(|m| m.content.as_str()), Some("Hello"));
        session.handle_host_event(&tagged(end("Hello"), epoch));

        assert_eq!(
            session.transcript(),
            [ChatMessage::user("Hello"), ChatMessage::assistant("Hello")]
        );
        assert!(session.scratch().is_none());
        assert!(!session.is_generating());
        assert_eq!(session.stream_state(), StreamState::Idle);

        let persisted = transport.last().expect("persist envelope");
        assert_eq!(persisted.kind, d::SET_WORKSPACE_CONTEXT);
        assert_eq!(persisted.key.as_deref(), Some(d::context_key::LAST_CONVERSATION));
        assert_eq!(
            persisted.data,
            Some(json!([
                { "role": "user", "content": "Hello" },
                { "role": "assistant", "content": "Hello" }
            ]))
        );
    }

    #[test]
    fn submit_sends_full_history_with_fresh_epoch() {
        let (mut session, transport) = session();
        let first = session.submit("one").expect("first");
        session.handle_host_event(&tagged(end("reply"), first));
        let second = session.submit("two").expect("second");

        assert!(second > first);
        let sent = transport
            .sent()
            .into_iter()
            .filter(|envelope| envelope.kind == d::CHAT_MESSAGE)
            .collect::<Vec<_>>();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].epoch, Some(second));
        assert_eq!(
            sent[1].data.as_ref().and_then(|data| data.as_array()).map(Vec::len),
            Some(3)
        );
    }

    #[test]
    fn blank_input_sends_nothing_and_appends_nothing() {
        let (mut session, transport) = session();
        assert_eq!(session.submit(""), Err(SubmitRejection::Blank));
        assert_eq!(session.submit("  \n\t"), Err(SubmitRejection::Blank));

        assert!(transport.sent().is_empty());
        assert!(session.transcript().is_empty());
        assert_eq!(session.stream_state(), StreamState::Idle);
    }

    #[test]
    fn submission_is_disabled_while_generating() {
        let (mut session, transport) = session();
        session.submit("first").expect("first");
        assert!(session.input().is_disabled());
        assert_eq!(session.submit("second"), Err(SubmitRejection::Generating));
        assert_eq!(transport.count(d::CHAT_MESSAGE), 1);
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn cumulative_tokens_leave_last_snapshot_in_scratch() {
        let (mut session, _) = session();
        let epoch = session.submit("count").expect("submitted");
        for snapshot in ["1", "1 2", "1 2 3", "1 2 3 4"] {
            session.handle_host_event(&tagged(token(snapshot), epoch));
        }
        assert_eq!(
            session.scratch().map(|m| m.content.as_str()),
            Some("1 2 3 4")
        );
    }

    #[test]
    fn empty_end_payload_adds_no_history_entry() {
        let (mut session, transport) = session();
        let epoch = session.submit("Hi").expect("submitted");
        session.handle_host_event(&tagged(token("partial"), epoch));
        session.handle_host_event(&HostEnvelope::new(d::COMPLETION_END).with_epoch(Some(epoch)));

        assert_eq!(session.transcript().len(), 1);
        assert!(session.scratch().is_none());
        assert!(!session.is_generating());
        assert_eq!(transport.count(d::SET_WORKSPACE_CONTEXT), 0);
    }

    #[test]
    fn stop_then_late_untagged_token_is_ignored() {
        let (mut session, transport) = session();
        session.submit("X").expect("submitted");
        session.handle_host_event(&token("partial"));
        assert!(session.stop());
        assert_eq!(transport.count(d::STOP_GENERATION), 1);

        session.handle_host_event(&token("partial more"));
        session.handle_host_event(&end("partial more"));

        assert_eq!(session.transcript(), [ChatMessage::user("X")]);
        assert!(session.scratch().is_none());
        assert!(!session.is_generating());
        assert!(!session.input().is_disabled());
    }

    #[test]
    fn stop_then_late_tagged_token_is_ignored_even_after_next_submit() {
        let (mut session, _) = session();
        let first = session.submit("X").expect("first");
        session.handle_host_event(&tagged(token("partial"), first));
        session.stop();

        let second = session.submit("Y").expect("second");
        session.handle_host_event(&tagged(token("partial more"), first));
        session.handle_host_event(&tagged(end("partial more"), first));

        assert!(session.scratch().is_none());
        assert_eq!(session.stream_state(), StreamState::Loading(second));
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn stop_when_idle_sends_nothing() {
        let (mut session, transport) = session();
        assert!(!session.stop());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn errors_render_inline_as_assistant_entries() {
        let (mut session, _) = session();
        let epoch = session.submit("Hi").expect("submitted");
        session.handle_host_event(
            &HostEnvelope::new(d::COMPLETION_END)
                .with_value(EnvelopeValue::error("model not found"))
                .with_epoch(Some(epoch)),
        );

        let last = session.transcript().last().expect("entry");
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.error.as_deref(), Some("model not found"));
    }

    #[test]
    fn token_metadata_carries_type_and_language() {
        let (mut session, _) = session();
        let epoch = session.submit("code").expect("submitted");
        session.handle_host_event(&tagged(
            HostEnvelope::new(d::COMPLETION_TOKEN).with_value(EnvelopeValue {
                completion: Some("fn main() {}".to_string()),
                data: Some(json!("rust")),
                kind: Some("chat".to_string()),
                error: None,
            }),
            epoch,
        ));
        session.handle_host_event(&tagged(end("fn main() {}"), epoch));

        let last = session.transcript().last().expect("entry");
        assert_eq!(last.kind.as_deref(), Some("chat"));
        assert_eq!(last.language.as_deref(), Some("rust"));
    }

    #[test]
    fn host_initiated_turn_streams_without_submit() {
        let (mut session, transport) = session();
        session.handle_host_event(
            &HostEnvelope::new(d::ADD_MESSAGE)
                .with_value(EnvelopeValue::completion("Explain this code")),
        );
        assert!(session.is_generating());

        session.handle_host_event(&HostEnvelope::new(d::LOADING_STARTED));
        assert!(session.is_loading());
        session.handle_host_event(&token("It prints"));
        assert!(!session.is_loading());
        session.handle_host_event(&end("It prints hello"));

        assert_eq!(
            session.transcript(),
            [
                ChatMessage::user("Explain this code"),
                ChatMessage::assistant("It prints hello")
            ]
        );
        assert_eq!(transport.count(d::CHAT_MESSAGE), 0);
    }

    #[test]
    fn host_stop_acknowledgement_clears_scratch() {
        let (mut session, _) = session();
        let epoch = session.submit("Hi").expect("submitted");
        session.handle_host_event(&tagged(token("par"), epoch));
        session.handle_host_event(
            &HostEnvelope::new(d::GENERATION_STOPPED).with_epoch(Some(epoch)),
        );

        assert!(session.scratch().is_none());
        assert!(!session.is_generating());
        assert!(session.stream_state().is_stopped());
    }

    #[test]
    fn toggles_flip_optimistically_and_persist_once_each() {
        let (mut session, transport) = session();

        assert!(session.toggle_auto_scroll());
        assert_eq!(transport.count(d::SET_WORKSPACE_CONTEXT), 1);
        assert!(session.scroll().is_pending());
        assert!(!session.toggle_auto_scroll());
        assert_eq!(transport.count(d::SET_WORKSPACE_CONTEXT), 2);

        assert!(session.toggle_show_providers());
        let sent = transport.last().expect("persist");
        assert_eq!(sent.key.as_deref(), Some(d::context_key::SHOW_PROVIDERS));
        assert_eq!(sent.data, Some(json!(true)));
    }

    #[test]
    fn appends_schedule_scroll_only_with_auto_scroll() {
        let (mut session, _) = session();
        session.submit("quiet").expect("submitted");
        assert!(!session.scroll().is_pending());

        let (mut session, _) = self::session();
        session.apply_auto_scroll(true);
        session.submit("loud").expect("submitted");
        let due = session.scroll().due_at().expect("pending");
        assert!(due <= Instant::now() + Duration::from_secs(1));
    }

    #[test]
    fn restore_replaces_transcript_only_when_idle() {
        let (mut session, _) = session();
        session.restore_conversation(&[ChatMessage::user("old"), ChatMessage::assistant("reply")]);
        assert_eq!(session.transcript().len(), 2);

        session.submit("new").expect("submitted");
        session.restore_conversation(&[]);
        assert_eq!(session.transcript().len(), 3);
    }

    #[test]
    fn enter_key_submits_input_box() {
        let (mut session, transport) = session();
        session.set_input_text("from keyboard");
        assert!(matches!(session.press_key(InputKey::Enter), Some(Ok(_))));
        assert_eq!(session.input().text(), "");
        assert_eq!(transport.count(d::CHAT_MESSAGE), 1);

        session.set_input_text("queued");
        assert_eq!(
            session.press_key(InputKey::Enter),
            Some(Err(SubmitRejection::Generating))
        );
        assert_eq!(session.input().text(), "queued");
    }

    #[test]
    fn ctrl_enter_inserts_newline_without_submitting() {
        let (mut session, transport) = session();
        session.set_input_text("first line");
        assert_eq!(session.press_key(InputKey::CtrlEnter), None);
        assert_eq!(session.input().text(), "first line\n");
        assert!(transport.sent().is_empty());
    }

    /// A session whose only turn was cancelled mid-stream.
    fn stopped_session() -> (ChatSession, Epoch) {
        let (mut session, _) = session();
        let epoch = session.submit("X").expect("submitted");
        session.handle_host_event(&token("partial"));
        assert!(session.stop());
        (session, epoch)
    }

    fn assert_still_stopped(session: &ChatSession) {
        assert!(!session.is_generating());
        assert!(session.stream_state().is_stopped());
        assert!(session.scratch().is_none());
        assert_eq!(session.transcript(), [ChatMessage::user("X")]);
        assert!(!session.input().is_disabled());
    }

    #[test]
    fn lifecycle_envelopes_after_stop_do_not_reopen_a_turn() {
        let late = [
            HostEnvelope::new(d::LOADING_STARTED),
            HostEnvelope::new(d::ADD_MESSAGE)
                .with_value(EnvelopeValue::completion("template prompt")),
            HostEnvelope::new(d::GENERATION_STOPPED),
        ];

        for envelope in late {
            for tag in [false, true] {
                let (mut session, epoch) = stopped_session();
                let envelope = if tag {
                    tagged(envelope.clone(), epoch)
                } else {
                    envelope.clone()
                };
                session.handle_host_event(&envelope);
                assert_still_stopped(&session);
                assert!(!session.is_loading(), "{} tagged={tag}", envelope.kind);

                session.handle_host_event(&token("partial more"));
                assert_still_stopped(&session);
            }
        }
    }

    #[test]
    fn stale_tagged_add_message_while_idle_is_ignored() {
        let (mut session, _) = session();
        let first = session.submit("one").expect("submitted");
        session.handle_host_event(&tagged(end("reply"), first));

        session.handle_host_event(&tagged(
            HostEnvelope::new(d::ADD_MESSAGE).with_value(EnvelopeValue::completion("late")),
            first,
        ));

        assert!(!session.is_generating());
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn git_changes_request_rearms_a_stopped_session() {
        let (mut session, _) = stopped_session();
        session.request_git_changes();
        session.handle_host_event(
            &HostEnvelope::new(d::ADD_MESSAGE)
                .with_value(EnvelopeValue::completion("Write a commit message")),
        );
        session.handle_host_event(&token("Add"));

        assert!(session.is_generating());
        assert_eq!(session.scratch().map(|m| m.content.as_str()), Some("Add"));
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn git_changes_request_is_fire_and_forget() {
        let (mut session, transport) = session();
        session.request_git_changes();
        assert_eq!(transport.kinds(), [d::GET_GIT_CHANGES]);
    }
}
