use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parley_bridge::{ClientMessage, HostEnvelope, MessageChannel, Subscription};
use serde::de::DeserializeOwned;

/// Host-owned value mirrored locally.
///
/// On activation it registers for one exact reply discriminant and then posts
/// one request. Every matching reply that decodes replaces the local value
/// wholesale. Without a reply the value stays `None`; there is no timeout.
pub struct HostValue<T> {
    value: Arc<ArcSwapOption<T>>,
    reply: String,
    _subscription: Subscription,
}

impl<T> HostValue<T>
where
    T: Send + Sync + 'static,
{
    pub fn watch<D>(
        channel: &MessageChannel,
        request: ClientMessage,
        reply: impl Into<String>,
        decode: D,
    ) -> Self
    where
        D: Fn(&HostEnvelope) -> Option<T> + Send + Sync + 'static,
    {
        Self::watch_with(channel, request, reply, decode, |_| {})
    }

    /// Like [`HostValue::watch`], calling `on_update` after each replacement.
    pub fn watch_with<D, F>(
        channel: &MessageChannel,
        request: ClientMessage,
        reply: impl Into<String>,
        decode: D,
        on_update: F,
    ) -> Self
    where
        D: Fn(&HostEnvelope) -> Option<T> + Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let value = Arc::new(ArcSwapOption::empty());
        let reply = reply.into();

        let slot = Arc::clone(&value);
        // Register before requesting so an immediate reply cannot be missed.
        let subscription = channel.on_discriminant(reply.clone(), move |envelope| {
            let Some(decoded) = decode(envelope) else {
                tracing::debug!(
                    discriminant = %envelope.kind,
                    "reply carried no usable value, keeping previous state"
                );
                return;
            };

            let decoded = Arc::new(decoded);
            slot.store(Some(Arc::clone(&decoded)));
            on_update(&decoded);
        });

        channel.send_message(request);

        Self {
            value,
            reply,
            _subscription: subscription,
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    pub fn is_resolved(&self) -> bool {
        self.value.load().is_some()
    }

    /// Overrides the local value without telling the host.
    pub fn set_local(&self, value: T) {
        self.value.store(Some(Arc::new(value)));
    }

    pub fn reply_discriminant(&self) -> &str {
        &self.reply
    }
}

impl<T> HostValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn cloned(&self) -> Option<T> {
        self.get().map(|value| T::clone(&value))
    }
}

/// Decoder for replies carrying the value in `value.data`.
pub fn data_decoder<T>() -> impl Fn(&HostEnvelope) -> Option<T> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    |envelope: &HostEnvelope| {
        envelope.data()?;
        match envelope.decode_data::<T>() {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    discriminant = %envelope.kind,
                    error = %error,
                    "failed to decode host reply"
                );
                None
            }
        }
    }
}
