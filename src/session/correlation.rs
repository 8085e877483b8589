//! Request/response correlation.
//!
//! Maps request identifiers to the channel that settles the caller's
//! [`PendingResponse`]. Settlement is event-driven: a response, a remote
//! failure, or the request's timer removes the entry and completes the
//! channel. The first of those to remove the entry wins; every later
//! attempt is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

/// Channel completing a caller's outcome.
type Settlement = oneshot::Sender<Result<Value>>;

/// Outstanding request record.
#[derive(Debug)]
struct PendingEntry {
    /// Completes the caller's future.
    tx: Settlement,
    /// When the entry was registered.
    issued_at: Instant,
    /// Deadline the timer was armed with.
    deadline: Option<Duration>,
    /// Timer task, aborted on early settlement.
    timer: Option<AbortHandle>,
}

// ============================================================================
// PendingResponse
// ============================================================================

/// Future resolving to the outcome of an issued command.
///
/// Settles exactly once with the response value, or with
/// [`Error::Transport`], [`Error::Timeout`], [`Error::UnexpectedEnvelope`]
/// or [`Error::SessionClosed`]. Dropping it abandons the outcome; the store
/// still settles or expires the request.
#[derive(Debug)]
#[must_use = "dropping a PendingResponse discards the command's outcome"]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    /// Returns the identifier of the request this future settles.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::SessionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// CorrelationStore
// ============================================================================

/// Tracks outstanding requests by identifier.
///
/// All lookups are O(1) map operations under a short-lived lock; no
/// operation scans the table except [`fail_all`](Self::fail_all).
#[derive(Debug, Default)]
pub struct CorrelationStore {
    pending: Mutex<FxHashMap<RequestId, PendingEntry>>,
}

impl CorrelationStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new outstanding request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if `id` is already pending. Identifier
    /// allocation is monotonic, so this indicates a bug in the caller.
    pub fn create_pending(&self, id: RequestId) -> Result<PendingResponse> {
        let mut pending = self.pending.lock();
        debug_assert!(!pending.contains_key(&id), "request {id} registered twice");
        if pending.contains_key(&id) {
            return Err(Error::duplicate_id(id));
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(
            id,
            PendingEntry {
                tx,
                issued_at: Instant::now(),
                deadline: None,
                timer: None,
            },
        );

        trace!(request_id = %id, "Pending request registered");
        Ok(PendingResponse { id, rx })
    }

    /// Arms a timer that calls [`expire`](Self::expire) after `deadline`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm_timeout(self: &Arc<Self>, id: RequestId, deadline: Duration) {
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            sleep(deadline).await;
            if let Some(store) = store.upgrade() {
                store.expire(id);
            }
        })
        .abort_handle();

        let mut pending = self.pending.lock();
        match pending.get_mut(&id) {
            Some(entry) => {
                entry.deadline = Some(deadline);
                entry.timer = Some(handle);
            }
            // Already settled; the timer has nothing left to do.
            None => handle.abort(),
        }
    }

    /// Settles `id` with a success value. No-op if `id` is not pending.
    pub fn resolve(&self, id: RequestId, value: Value) -> bool {
        self.settle(id, Ok(value))
    }

    /// Settles `id` with the remote error string. No-op if `id` is not pending.
    pub fn reject(&self, id: RequestId, message: impl Into<String>) -> bool {
        self.settle(id, Err(Error::transport(id, message)))
    }

    /// Settles `id` as a protocol violation. No-op if `id` is not pending.
    pub fn reject_unexpected(&self, id: RequestId, payload: Value) -> bool {
        self.settle(id, Err(Error::unexpected_envelope(id, payload)))
    }

    /// Settles `id` with a locally produced error. No-op if `id` is not pending.
    pub fn fail(&self, id: RequestId, error: Error) -> bool {
        self.settle(id, Err(error))
    }

    /// Settles `id` with [`Error::Timeout`]. No-op if `id` is not pending.
    pub fn expire(&self, id: RequestId) -> bool {
        let Some(entry) = self.pending.lock().remove(&id) else {
            return false;
        };

        let waited = entry.deadline.unwrap_or_else(|| entry.issued_at.elapsed());
        let timeout_ms = duration_ms(waited);
        debug!(request_id = %id, timeout_ms, "Request timed out");

        // Called from the timer task itself, so it is not aborted here.
        Self::complete(id, entry.tx, Err(Error::timeout(id, timeout_ms)));
        true
    }

    /// Settles every pending request with [`Error::SessionClosed`].
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (id, entry) in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            Self::complete(id, entry.tx, Err(Error::SessionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
        count
    }

    /// Returns `true` if `id` is still outstanding.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Returns the number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Removes `id` and completes its channel.
    fn settle(&self, id: RequestId, outcome: Result<Value>) -> bool {
        let Some(entry) = self.pending.lock().remove(&id) else {
            warn!(request_id = %id, "Response for unknown or settled request");
            return false;
        };

        if let Some(timer) = entry.timer {
            timer.abort();
        }

        trace!(
            request_id = %id,
            elapsed_ms = duration_ms(entry.issued_at.elapsed()),
            "Request settled"
        );
        Self::complete(id, entry.tx, outcome);
        true
    }

    /// Sends the outcome, tolerating callers that abandoned it.
    fn complete(id: RequestId, tx: Settlement, outcome: Result<Value>) {
        if tx.send(outcome).is_err() {
            trace!(request_id = %id, "Outcome abandoned by caller");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::FutureExt;
    use serde_json::json;

    fn id(n: u64) -> RequestId {
        RequestId::new(n)
    }

    #[tokio::test]
    async fn test_resolve_settles_with_value() {
        let store = CorrelationStore::new();
        let pending = store.create_pending(id(0)).expect("create");
        assert_eq!(pending.id(), id(0));

        assert!(store.resolve(id(0), json!({ "ok": true })));
        assert_eq!(pending.await.expect("resolved"), json!({ "ok": true }));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_pending_until_settled() {
        let store = CorrelationStore::new();
        let mut pending = tokio_test::task::spawn(store.create_pending(id(30)).expect("create"));
        tokio_test::assert_pending!(pending.poll());

        store.resolve(id(30), json!("x"));
        assert!(pending.is_woken());
        let outcome = tokio_test::assert_ready!(pending.poll());
        assert_eq!(outcome.expect("resolved"), json!("x"));
    }

    #[tokio::test]
    async fn test_settles_exactly_once() {
        let store = CorrelationStore::new();
        let pending = store.create_pending(id(1)).expect("create");

        assert!(store.resolve(id(1), json!(1)));
        assert!(!store.resolve(id(1), json!(2)));
        assert!(!store.reject(id(1), "late"));
        assert!(!store.expire(id(1)));
        assert!(!store.reject_unexpected(id(1), json!({})));

        assert_eq!(pending.await.expect("resolved"), json!(1));
    }

    #[tokio::test]
    async fn test_reject_carries_remote_message() {
        let store = CorrelationStore::new();
        let pending = store.create_pending(id(2)).expect("create");

        assert!(store.reject(id(2), "variant set missing"));
        match pending.await {
            Err(Error::Transport {
                request_id,
                message,
            }) => {
                assert_eq!(request_id, id(2));
                assert_eq!(message, "variant set missing");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reject_unexpected_is_distinct() {
        let store = CorrelationStore::new();
        let pending = store.create_pending(id(7)).expect("create");

        store.reject_unexpected(id(7), json!({ "id": 7 }));
        let err = pending.await.expect_err("should reject");
        assert!(err.is_protocol_violation());
        assert!(!err.is_timeout());
        assert!(!err.is_remote());
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let store = CorrelationStore::new();
        assert!(!store.resolve(id(99), json!(null)));
        assert!(!store.reject(id(99), "x"));
        assert!(!store.expire(id(99)));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = CorrelationStore::new();
        let _first = store.create_pending(id(3)).expect("create");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.create_pending(id(3))
        }));

        // Debug builds assert; release builds return the error.
        match result {
            Ok(Err(Error::DuplicateId { request_id })) => assert_eq!(request_id, id(3)),
            Ok(other) => panic!("expected DuplicateId, got {other:?}"),
            Err(_) => assert!(cfg!(debug_assertions)),
        }
        assert_eq!(store.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_at_deadline_not_before() {
        let store = Arc::new(CorrelationStore::new());
        let mut pending = store.create_pending(id(4)).expect("create");
        store.arm_timeout(id(4), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(99)).await;
        tokio::task::yield_now().await;
        assert!((&mut pending).now_or_never().is_none());
        assert!(store.is_pending(id(4)));

        tokio::time::advance(Duration::from_millis(1)).await;
        match pending.await {
            Err(Error::Timeout {
                request_id,
                timeout_ms,
            }) => {
                assert_eq!(request_id, id(4));
                assert_eq!(timeout_ms, 100);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(!store.is_pending(id(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_before_timer_wins() {
        let store = Arc::new(CorrelationStore::new());
        let pending = store.create_pending(id(5)).expect("create");
        store.arm_timeout(id(5), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(store.resolve(id(5), json!("done")));
        assert_eq!(pending.await.expect("resolved"), json!("done"));

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_still_expires() {
        let store = Arc::new(CorrelationStore::new());
        drop(store.create_pending(id(6)).expect("create"));
        store.arm_timeout(id(6), Duration::from_millis(10));

        assert_eq!(store.pending_count(), 1);
        tokio::time::sleep(Duration::from_millis(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let store = Arc::new(CorrelationStore::new());
        let a = store.create_pending(id(10)).expect("create");
        let b = store.create_pending(id(11)).expect("create");
        store.arm_timeout(id(11), Duration::from_secs(60));

        assert_eq!(store.fail_all(), 2);
        assert!(matches!(a.await, Err(Error::SessionClosed)));
        assert!(matches!(b.await, Err(Error::SessionClosed)));
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let store = CorrelationStore::new();
        let first = store.create_pending(id(20)).expect("create");
        let second = store.create_pending(id(21)).expect("create");

        store.resolve(id(21), json!("second"));
        store.resolve(id(20), json!("first"));

        assert_eq!(first.await.expect("first"), json!("first"));
        assert_eq!(second.await.expect("second"), json!("second"));
    }
}
