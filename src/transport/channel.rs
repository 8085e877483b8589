//! In-process channel transport.
//!
//! Connects a session to a [`ChannelPeer`] through tokio channels. Used for
//! loopback, tests, and embedding the session behind another event loop
//! that owns the real streaming client.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Envelope, LifecycleEvent};

use super::{Inbound, InboundReceiver, InboundSender, Transport};

// ============================================================================
// ChannelTransport
// ============================================================================

/// Session side of an in-process transport pair.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: Mutex<Option<InboundReceiver>>,
    closed: AtomicBool,
}

impl ChannelTransport {
    /// Creates a connected transport/peer pair.
    #[must_use]
    pub fn pair() -> (Self, ChannelPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            outbound: outbound_tx,
            inbound: Mutex::new(Some(inbound_rx)),
            closed: AtomicBool::new(false),
        };
        let peer = ChannelPeer {
            outbound: outbound_rx,
            inbound: inbound_tx,
        };
        (transport, peer)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::send("channel transport closed"));
        }
        trace!(len = text.len(), "Channel frame sent");
        self.outbound
            .send(text)
            .map_err(|_| Error::send("channel peer dropped"))
    }

    fn take_inbound(&self) -> Option<InboundReceiver> {
        self.inbound.lock().take()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

// ============================================================================
// ChannelPeer
// ============================================================================

/// Remote side of an in-process transport pair.
///
/// Plays the remote application: reads requests the session sent and
/// injects responses, signals and lifecycle events.
#[derive(Debug)]
pub struct ChannelPeer {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: InboundSender,
}

impl ChannelPeer {
    /// Receives the next raw frame sent by the session.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Receives and decodes the next envelope sent by the session.
    ///
    /// Frames that are not envelopes are logged and skipped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        while let Some(text) = self.outbound.recv().await {
            match serde_json::from_str(&text) {
                Ok(envelope) => return Some(envelope),
                Err(e) => warn!(error = %e, "Peer received non-envelope frame"),
            }
        }
        None
    }

    /// Returns an already-sent envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        let text = self.outbound.try_recv().ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Delivers a custom-event envelope to the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session stopped reading.
    pub fn deliver(&self, envelope: Envelope) -> Result<()> {
        self.push(Inbound::Custom(envelope))
    }

    /// Answers `request` with a success value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `request` has no integer id, or
    /// [`Error::SessionClosed`] if the session stopped reading.
    pub fn respond(&self, request: &Envelope, value: Value) -> Result<()> {
        let id = Self::id_of(request)?;
        self.deliver(Envelope::response(request.event_type.clone(), id, value))
    }

    /// Answers `request` with a failure.
    ///
    /// # Errors
    ///
    /// Same as [`respond`](Self::respond).
    pub fn fail(&self, request: &Envelope, message: impl Into<String>) -> Result<()> {
        let id = Self::id_of(request)?;
        self.deliver(Envelope::failure(request.event_type.clone(), id, message))
    }

    /// Emits a named signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session stopped reading.
    pub fn signal(&self, name: &str, value: Value) -> Result<()> {
        self.deliver(Envelope::signal(name, value))
    }

    /// Emits a lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session stopped reading.
    pub fn lifecycle(&self, event: LifecycleEvent) -> Result<()> {
        self.push(Inbound::Lifecycle(event))
    }

    /// Reports the transport as closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session stopped reading.
    pub fn close(&self) -> Result<()> {
        self.push(Inbound::Closed)
    }

    fn push(&self, frame: Inbound) -> Result<()> {
        self.inbound.send(frame).map_err(|_| Error::SessionClosed)
    }

    fn id_of(request: &Envelope) -> Result<RequestId> {
        request
            .request_id()
            .ok_or_else(|| Error::protocol(format!("{} carries no id", request.event_type)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Map, json};

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (transport, mut peer) = ChannelTransport::pair();
        let request = Envelope::request("command_undo", Map::new(), RequestId::new(0));

        transport
            .send(serde_json::to_string(&request).expect("serialize"))
            .expect("send");

        assert_eq!(peer.recv().await, Some(request));
    }

    #[tokio::test]
    async fn test_peer_respond_builds_response() {
        let (transport, peer) = ChannelTransport::pair();
        let mut inbound = transport.take_inbound().expect("inbound");
        assert!(transport.take_inbound().is_none());

        let request = Envelope::request("select_car", Map::new(), RequestId::new(3));
        peer.respond(&request, json!({ "ok": true })).expect("respond");

        match inbound.recv().await {
            Some(Inbound::Custom(envelope)) => {
                assert_eq!(envelope.request_id(), Some(RequestId::new(3)));
                assert_eq!(envelope.payload["response"], json!({ "ok": true }));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_closed_transport_rejects_send() {
        let (transport, _peer) = ChannelTransport::pair();
        transport.close();
        let err = transport.send("{}".into()).expect_err("closed");
        assert!(matches!(err, Error::Send { .. }));
    }

    #[test]
    fn test_send_after_peer_dropped() {
        let (transport, peer) = ChannelTransport::pair();
        drop(peer);
        assert!(transport.send("{}".into()).is_err());
    }
}
