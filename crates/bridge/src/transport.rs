use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::envelope::{ClientEnvelope, HostEnvelope};

/// Outbound half of the webview/host channel.
///
/// `post` is fire-and-forget and must not block. Implementations must not
/// deliver host replies synchronously from inside `post`; replies re-enter the
/// webview through [`crate::MessageChannel::dispatch`].
pub trait Transport: Send + Sync {
    fn post(&self, envelope: ClientEnvelope);
}

/// Transport double that records every posted envelope.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<ClientEnvelope>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<ClientEnvelope> {
        self.sent.lock().clone()
    }

    pub fn take(&self) -> Vec<ClientEnvelope> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn kinds(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|envelope| envelope.kind.clone())
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|envelope| envelope.kind == kind)
            .count()
    }

    pub fn last(&self) -> Option<ClientEnvelope> {
        self.sent.lock().last().cloned()
    }
}

impl Transport for RecordingTransport {
    fn post(&self, envelope: ClientEnvelope) {
        self.sent.lock().push(envelope);
    }
}

/// In-process transport backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    outbound: mpsc::UnboundedSender<ClientEnvelope>,
}

impl Transport for LoopbackTransport {
    fn post(&self, envelope: ClientEnvelope) {
        let kind = envelope.kind.clone();
        if self.outbound.send(envelope).is_err() {
            // The host went away; requests are lost and never replayed.
            tracing::debug!(discriminant = %kind, "host endpoint closed, dropping envelope");
        }
    }
}

/// Host side of a loopback pair.
#[derive(Debug)]
pub struct HostEndpoint {
    pub requests: mpsc::UnboundedReceiver<ClientEnvelope>,
    pub events: mpsc::UnboundedSender<HostEnvelope>,
}

impl HostEndpoint {
    /// Posts one envelope to the webview. Returns false once the webview is gone.
    pub fn emit(&self, envelope: HostEnvelope) -> bool {
        self.events.send(envelope).is_ok()
    }
}

/// Both ends of an in-process webview/host channel.
#[derive(Debug)]
pub struct Loopback {
    pub transport: Arc<LoopbackTransport>,
    pub inbound: mpsc::UnboundedReceiver<HostEnvelope>,
    pub host: HostEndpoint,
}

pub fn loopback() -> Loopback {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    Loopback {
        transport: Arc::new(LoopbackTransport {
            outbound: request_tx,
        }),
        inbound: event_rx,
        host: HostEndpoint {
            requests: request_rx,
            events: event_tx,
        },
    }
}
