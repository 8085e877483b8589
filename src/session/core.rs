//! Session handle.
//!
//! A [`Session`] owns one gateway (request counter, correlation store,
//! signal router) and one connection state machine. When its transport
//! yields inbound frames, a pump task forwards them:
//!
//! | Frame | Destination |
//! |-------|-------------|
//! | Custom event | [`SessionGateway::on_inbound_envelope`] |
//! | Lifecycle event | [`SessionStateMachine::observe`] |
//! | Closed | status → Error, pending requests → `SessionClosed` |
//!
//! # Example
//!
//! ```ignore
//! use stream_remote::{ChannelTransport, SceneCommand, Session};
//!
//! let (transport, peer) = ChannelTransport::pair();
//! let session = Session::builder().build(transport)?;
//!
//! let outcome = session.request(SceneCommand::select_car_by_dataset(4))?.await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{Command, Envelope, LifecycleEvent};
use crate::transport::{Inbound, InboundReceiver};

use super::builder::SessionBuilder;
use super::correlation::{CorrelationStore, PendingResponse};
use super::gateway::{Routed, SessionGateway};
use super::signal::SignalRouter;
use super::status::{ConnectionStatus, SessionStateMachine};

// ============================================================================
// SessionInner
// ============================================================================

/// Shared state behind every [`Session`] clone.
pub(crate) struct SessionInner {
    /// Ingress/egress point.
    gateway: Arc<SessionGateway>,
    /// Outstanding requests.
    store: Arc<CorrelationStore>,
    /// Signal handlers.
    router: Arc<SignalRouter>,
    /// Connection status.
    status: Arc<SessionStateMachine>,
    /// Inbound pump task, if the transport yields frames.
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        self.gateway.close();
    }
}

// ============================================================================
// Session
// ============================================================================

/// Request/response session over a stream's custom event channel.
///
/// Cheap to clone; clones share the same state. The last clone dropped
/// disposes the session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("pending", &self.pending_count())
            .field("signals", &self.inner.router.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl Session {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Assembles a session and starts pumping `inbound`, if any.
    pub(crate) fn start(
        gateway: Arc<SessionGateway>,
        store: Arc<CorrelationStore>,
        router: Arc<SignalRouter>,
        inbound: Option<InboundReceiver>,
    ) -> Self {
        let status = Arc::new(SessionStateMachine::new());

        let pump = inbound.map(|rx| {
            tokio::spawn(run_pump(
                rx,
                Arc::clone(&gateway),
                Arc::clone(&store),
                Arc::clone(&status),
            ))
        });

        debug!(pumping = pump.is_some(), "Session started");

        Self {
            inner: Arc::new(SessionInner {
                gateway,
                store,
                router,
                status,
                pump: Mutex::new(pump),
            }),
        }
    }
}

// ============================================================================
// Session - Requests
// ============================================================================

impl Session {
    /// Sends `<command>_request` with `payload` and a custom deadline.
    ///
    /// # Errors
    ///
    /// See [`SessionGateway::issue`].
    pub fn issue(
        &self,
        command: &str,
        payload: Map<String, Value>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        self.inner.gateway.issue(command, payload, timeout)
    }

    /// Sends a typed command with the default deadline.
    ///
    /// # Errors
    ///
    /// See [`SessionGateway::request`].
    pub fn request(&self, command: impl Into<Command>) -> Result<PendingResponse> {
        self.inner.gateway.request(command)
    }

    /// Sends a typed command with a custom deadline.
    ///
    /// # Errors
    ///
    /// See [`SessionGateway::request_with_timeout`].
    pub fn request_with_timeout(
        &self,
        command: impl Into<Command>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        self.inner.gateway.request_with_timeout(command, timeout)
    }

    /// Returns the deadline applied by [`request`](Self::request).
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.inner.gateway.request_timeout()
    }

    /// Returns the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.store.pending_count()
    }
}

// ============================================================================
// Session - Inbound
// ============================================================================

impl Session {
    /// Routes an inbound custom event.
    ///
    /// Only needed when the transport does not yield frames itself.
    pub fn on_inbound_envelope(&self, envelope: Envelope) -> Routed {
        self.inner.gateway.on_inbound_envelope(envelope)
    }

    /// Decodes and routes an inbound custom event.
    pub fn on_inbound_text(&self, text: &str) -> Routed {
        self.inner.gateway.on_inbound_text(text)
    }

    /// Feeds a lifecycle event to the state machine.
    pub fn on_lifecycle(&self, event: &LifecycleEvent) -> Option<ConnectionStatus> {
        self.inner.status.observe(event)
    }
}

// ============================================================================
// Session - Signals
// ============================================================================

impl Session {
    /// Registers `handler` for signal `name`, replacing any previous one.
    ///
    /// `name` is the logical name, without the `_signal` suffix.
    pub fn subscribe_signal<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.inner.router.subscribe(name, handler);
    }

    /// Removes the handler for `name`.
    pub fn unsubscribe_signal(&self, name: &str) -> bool {
        self.inner.router.unsubscribe(name)
    }

    /// Registers another completion signal pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`](crate::Error::Pattern) if `pattern` does not compile.
    pub fn register_completion_signal(&self, pattern: &str) -> Result<()> {
        self.inner.gateway.register_completion_signal(pattern)
    }
}

// ============================================================================
// Session - Status
// ============================================================================

impl Session {
    /// Returns the current connection status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.current()
    }

    /// Returns a receiver notified on every status change.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Returns the status to Waiting, for embedders that restart the
    /// stream lifecycle on the same session.
    pub fn reset_status(&self) {
        self.inner.status.reset();
    }

    /// Waits until the stream reports Connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`](crate::Error::ConnectionTimeout)
    /// if the status is not Connected within `wait`.
    pub async fn wait_connected(&self, wait: Duration) -> Result<()> {
        self.inner
            .status
            .wait_for(ConnectionStatus::Connected, wait)
            .await
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Tears the session down.
    ///
    /// Fails every pending request with `SessionClosed`, clears signal
    /// handlers, stops the transport and rejects further requests.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.inner.gateway.is_closed() {
            return;
        }

        let failed = self.inner.gateway.close();
        self.inner.router.clear();
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }

        info!(failed, "Session disposed");
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.gateway.is_closed()
    }
}

// ============================================================================
// Inbound Pump
// ============================================================================

/// Forwards transport frames until the transport closes.
async fn run_pump(
    mut inbound: InboundReceiver,
    gateway: Arc<SessionGateway>,
    store: Arc<CorrelationStore>,
    status: Arc<SessionStateMachine>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame {
            Inbound::Custom(envelope) => {
                gateway.on_inbound_envelope(envelope);
            }

            Inbound::Lifecycle(event) => {
                status.observe(&event);
            }

            Inbound::Closed => {
                warn!("Transport closed");
                status.fail();
                store.fail_all();
                break;
            }
        }
    }

    debug!("Inbound pump terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::error::Error;
    use crate::protocol::{KitCommand, LifecycleStatus, SceneCommand};
    use crate::session::SessionOptions;
    use crate::transport::{ChannelPeer, ChannelTransport, Transport};

    fn session() -> (Session, ChannelPeer) {
        let (transport, peer) = ChannelTransport::pair();
        let session = Session::builder().build(transport).expect("session");
        (session, peer)
    }

    #[test]
    fn test_session_is_clone_and_debug() {
        fn assert_clone<T: Clone>() {}
        fn assert_debug<T: fmt::Debug>() {}
        assert_clone::<Session>();
        assert_debug::<Session>();
    }

    #[tokio::test]
    async fn test_select_car_scenario() {
        let (session, mut peer) = session();

        let pending = session
            .request(SceneCommand::select_car_by_dataset(4))
            .expect("issue");

        let request = peer.recv().await.expect("request");
        assert_eq!(request.event_type, "select_car_request");
        assert_eq!(
            Value::Object(request.payload.clone()),
            json!({ "cgns_idx": 4, "id": 0 })
        );

        peer.respond(&request, json!({ "ok": true })).expect("respond");
        assert_eq!(pending.await.expect("resolved"), json!({ "ok": true }));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_scenario() {
        let (session, mut peer) = session();

        let pending = session
            .issue("set_slice_pos", Map::new(), Duration::from_millis(100))
            .expect("issue");
        let id = pending.id();
        let _request = peer.recv().await.expect("request");

        let err = pending.await.expect_err("timeout");
        assert!(err.is_timeout());
        assert_eq!(session.pending_count(), 0);

        // A late response is ignored.
        peer.deliver(Envelope::response("set_slice_pos_request", id, json!(1)))
            .expect("deliver");
        tokio::task::yield_now().await;
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_inference_complete_scenario() {
        let (session, peer) = session();
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.subscribe_signal("inference_complete", move |v| {
            let _ = tx.send(v);
        });

        peer.signal("inference_complete", json!("inference_start"))
            .expect("signal");

        assert_eq!(rx.recv().await, Some(json!("inference_start")));
    }

    #[tokio::test]
    async fn test_unexpected_envelope_scenario() {
        let (session, peer) = session();
        let pendings: Vec<_> = (0..8)
            .map(|_| session.request(KitCommand::CommandUndo).expect("issue"))
            .collect();

        peer.deliver(Envelope::new("x", json_map(json!({ "id": 7 }))))
            .expect("deliver");

        let seventh = pendings.into_iter().nth(7).expect("seventh");
        let err = seventh.await.expect_err("unexpected");
        assert!(err.is_protocol_violation());
        assert_eq!(session.pending_count(), 7);
    }

    #[tokio::test]
    async fn test_lifecycle_scenario() {
        let (session, peer) = session();
        let mut status = session.status_receiver();
        assert_eq!(session.status(), ConnectionStatus::Waiting);

        peer.lifecycle(LifecycleEvent::start(LifecycleStatus::InProgress))
            .expect("lifecycle");
        status.changed().await.expect("changed");
        assert_eq!(*status.borrow_and_update(), ConnectionStatus::Connecting);

        peer.lifecycle(LifecycleEvent::start(LifecycleStatus::Success))
            .expect("lifecycle");
        session
            .wait_connected(Duration::from_secs(1))
            .await
            .expect("connected");

        peer.lifecycle(LifecycleEvent::start(LifecycleStatus::Error))
            .expect("lifecycle");
        status
            .wait_for(|s| *s == ConnectionStatus::Error)
            .await
            .expect("error status");
        assert_eq!(session.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn test_on_lifecycle_direct() {
        let (session, _peer) = session();
        let next = session.on_lifecycle(&LifecycleEvent::start(LifecycleStatus::Success));
        assert_eq!(next, Some(ConnectionStatus::Connected));
        assert!(session.status().is_connected());
    }

    #[tokio::test]
    async fn test_reset_status_after_error() {
        let (session, _peer) = session();
        session.on_lifecycle(&LifecycleEvent::start(LifecycleStatus::Error));
        assert_eq!(session.status(), ConnectionStatus::Error);

        session.reset_status();
        assert_eq!(session.status(), ConnectionStatus::Waiting);

        let next = session.on_lifecycle(&LifecycleEvent::start(LifecycleStatus::Success));
        assert_eq!(next, Some(ConnectionStatus::Connected));
    }

    #[tokio::test]
    async fn test_transport_close_fails_pending() {
        let (session, peer) = session();
        let pending = session.request(KitCommand::CommandUndo).expect("issue");

        peer.close().expect("close");

        assert!(matches!(pending.await, Err(Error::SessionClosed)));
        let mut status = session.status_receiver();
        status
            .wait_for(|s| *s == ConnectionStatus::Error)
            .await
            .expect("error status");
    }

    #[tokio::test]
    async fn test_dispose() {
        let (session, mut peer) = session();
        session.subscribe_signal("camera_moved", |_| {});
        let pending = session.request(KitCommand::CommandUndo).expect("issue");
        let _ = peer.recv().await;

        session.dispose();
        session.dispose();

        assert!(session.is_disposed());
        assert!(matches!(pending.await, Err(Error::SessionClosed)));
        assert!(!session.unsubscribe_signal("camera_moved"));
        assert!(matches!(
            session.request(KitCommand::CommandUndo),
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_drop_last_clone_fails_pending() {
        let (session, _peer) = session();
        let pending = session.request(KitCommand::CommandUndo).expect("issue");
        let clone = session.clone();

        drop(session);
        assert_eq!(clone.pending_count(), 1);

        drop(clone);
        assert!(matches!(pending.await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn test_manual_inbound_without_pump() {
        let transport = Arc::new(NullTransport::default());
        let session = Session::builder()
            .options(SessionOptions::new().with_request_timeout(Duration::from_secs(1)))
            .build_shared(Arc::clone(&transport) as Arc<dyn Transport>)
            .expect("session");

        let pending = session.request(KitCommand::CommandUndo).expect("issue");
        let routed = session
            .on_inbound_text(r#"{"event_type":"command_undo_request","payload":{"id":0,"response":true}}"#);
        assert!(matches!(routed, Routed::Response { settled: true, .. }));
        assert_eq!(pending.await.expect("resolved"), json!(true));
        assert_eq!(transport.frames.lock().len(), 1);
    }

    #[derive(Default)]
    struct NullTransport {
        frames: Mutex<Vec<String>>,
    }

    impl Transport for NullTransport {
        fn send(&self, text: String) -> Result<()> {
            self.frames.lock().push(text);
            Ok(())
        }
    }

    fn json_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
