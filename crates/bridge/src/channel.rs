use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::ClientMessage;
use crate::envelope::{ClientEnvelope, HostEnvelope};
use crate::transport::Transport;

type Listener = Arc<dyn Fn(&HostEnvelope) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl Registry {
    fn insert(&mut self, listener: Listener) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(existing, _)| *existing == id)
    }
}

/// Bidirectional message channel between the webview and its host.
///
/// Outbound envelopes go through the injected [`Transport`]. Inbound envelopes
/// are fanned out to every registered listener; callers filter by discriminant.
#[derive(Clone)]
pub struct MessageChannel {
    transport: Arc<dyn Transport>,
    registry: Arc<Mutex<Registry>>,
}

impl MessageChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn send(&self, envelope: ClientEnvelope) {
        tracing::trace!(discriminant = %envelope.kind, "posting envelope to host");
        self.transport.post(envelope);
    }

    /// Encodes and posts a typed message. Encoding failures are logged and dropped.
    pub fn send_message(&self, message: ClientMessage) {
        match message.into_envelope() {
            Ok(envelope) => self.send(envelope),
            Err(error) => {
                tracing::error!(error = %error, "failed to encode client message");
            }
        }
    }

    /// Registers `handler` for every inbound envelope accepted by `predicate`.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn on_message<P, H>(&self, predicate: P, handler: H) -> Subscription
    where
        P: Fn(&HostEnvelope) -> bool + Send + Sync + 'static,
        H: Fn(&HostEnvelope) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(move |envelope| {
            if predicate(envelope) {
                handler(envelope);
            }
        });
        let id = self.registry.lock().insert(listener);

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Registers `handler` for envelopes whose discriminant equals `kind` exactly.
    pub fn on_discriminant<H>(&self, kind: impl Into<String>, handler: H) -> Subscription
    where
        H: Fn(&HostEnvelope) + Send + Sync + 'static,
    {
        let kind = kind.into();
        self.on_message(move |envelope| envelope.kind == kind, handler)
    }

    /// Delivers one inbound envelope to the live listeners in registration order.
    pub fn dispatch(&self, envelope: &HostEnvelope) {
        // Snapshot first so listeners may (un)subscribe or send while running.
        let snapshot = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect::<Vec<_>>();

        for (id, listener) in snapshot {
            // A listener removed by an earlier one in this round must not fire.
            if !self.registry.lock().contains(id) {
                continue;
            }
            listener(envelope);
        }
    }

    /// Drains `inbound` until the host side closes, dispatching in delivery order.
    pub async fn pump(&self, mut inbound: mpsc::UnboundedReceiver<HostEnvelope>) {
        while let Some(envelope) = inbound.recv().await {
            self.dispatch(&envelope);
        }
        tracing::debug!("host event stream closed");
    }

    /// Dispatches every envelope already queued without waiting for more.
    pub fn drain(&self, inbound: &mut mpsc::UnboundedReceiver<HostEnvelope>) -> usize {
        let mut delivered = 0;
        while let Ok(envelope) = inbound.try_recv() {
            self.dispatch(&envelope);
            delivered += 1;
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

/// Registration handle returned by [`MessageChannel::on_message`].
///
/// Dropping it removes the listener. Unsubscribing is idempotent.
#[must_use = "dropping a subscription unregisters its listener"]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Returns true only on the call that removed it.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = registry.lock().remove(self.id);
        self.registry = Weak::new();
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::transport::{Loopback, RecordingTransport, loopback};

    fn channel() -> (MessageChannel, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        (MessageChannel::new(transport.clone()), transport)
    }

    #[test]
    fn listeners_only_see_matching_discriminants() {
        let (channel, _) = channel();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _subscription = channel.on_discriminant("theme-changed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.dispatch(&HostEnvelope::new("theme-changed"));
        channel.dispatch(&HostEnvelope::new("theme-changed-extra"));
        channel.dispatch(&HostEnvelope::new("language-changed"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_unregisters_exactly_once() {
        let (channel, _) = channel();
        let mut subscription = channel.on_message(|_| true, |_| {});
        let other = channel.on_message(|_| true, |_| {});
        assert_eq!(channel.listener_count(), 2);

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        drop(subscription);
        assert_eq!(channel.listener_count(), 1);

        drop(other);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn listener_removed_mid_dispatch_does_not_fire() {
        let (channel, _) = channel();
        let victim_hits = Arc::new(AtomicUsize::new(0));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_slot = victim.clone();
        let _killer = channel.on_message(
            |_| true,
            move |_| {
                victim_slot.lock().take();
            },
        );

        let counter = victim_hits.clone();
        *victim.lock() = Some(channel.on_message(
            |_| true,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        channel.dispatch(&HostEnvelope::new("anything"));
        assert_eq!(victim_hits.load(Ordering::SeqCst), 0);
        assert_eq!(channel.listener_count(), 1);
    }

    #[test]
    fn send_message_posts_encoded_envelope() {
        let (channel, transport) = channel();
        channel.send_message(ClientMessage::GetConfigValue {
            key: "enabled".to_string(),
        });

        let sent = transport.last().expect("posted");
        assert_eq!(sent.kind, "get-config-value");
        assert_eq!(sent.key.as_deref(), Some("enabled"));
    }

    #[tokio::test]
    async fn pump_dispatches_in_delivery_order_until_host_closes() {
        let Loopback {
            transport,
            inbound,
            host,
        } = loopback();
        let channel = MessageChannel::new(transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let _subscription = channel.on_message(
            |_| true,
            move |envelope| log.lock().push(envelope.kind.clone()),
        );

        for kind in ["loading-started", "completion-token", "completion-end"] {
            assert!(host.emit(HostEnvelope::new(kind)));
        }
        drop(host);

        channel.pump(inbound).await;
        assert_eq!(
            *seen.lock(),
            ["loading-started", "completion-token", "completion-end"]
        );
    }
}
