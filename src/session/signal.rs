//! Out-of-band signal routing.
//!
//! Signals are unsolicited named notifications from the remote application
//! (for example `inference_complete`). Each name has at most one live
//! handler; subscribing again replaces the previous handler.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

// ============================================================================
// Types
// ============================================================================

/// Signal handler callback type.
///
/// Called synchronously with the signal's payload.
pub type SignalHandler = Arc<dyn Fn(Value) + Send + Sync>;

// ============================================================================
// SignalRouter
// ============================================================================

/// Delivers named signals to at most one handler per name.
///
/// Handlers run outside the registry lock, so a handler may subscribe or
/// unsubscribe (including itself) while it runs.
#[derive(Default)]
pub struct SignalRouter {
    handlers: RwLock<FxHashMap<String, SignalHandler>>,
}

impl fmt::Debug for SignalRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("SignalRouter")
            .field("names", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SignalRouter {
    /// Creates an empty router.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `name`, replacing any previous handler.
    pub fn subscribe<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self
            .handlers
            .write()
            .insert(name.clone(), Arc::new(handler))
            .is_some();
        debug!(signal = %name, replaced, "Signal handler registered");
    }

    /// Removes the handler for `name`.
    ///
    /// Returns `true` if a handler was registered.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let removed = self.handlers.write().remove(name).is_some();
        if removed {
            debug!(signal = %name, "Signal handler removed");
        }
        removed
    }

    /// Invokes the handler for `name` with `payload`.
    ///
    /// Signals with no handler are logged and dropped. Returns `true` if a
    /// handler ran.
    pub fn dispatch(&self, name: &str, payload: Value) -> bool {
        let handler = self.handlers.read().get(name).cloned();

        match handler {
            Some(handler) => {
                trace!(signal = %name, "Dispatching signal");
                handler(payload);
                true
            }
            None => {
                debug!(signal = %name, "Unhandled signal");
                false
            }
        }
    }

    /// Returns `true` if `name` has a handler.
    #[inline]
    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns `true` if no handler is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(Value) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().push(v))
    }

    #[test]
    fn test_dispatch_to_subscriber() {
        let router = SignalRouter::new();
        let (seen, handler) = recorder();
        router.subscribe("inference_complete", handler);

        assert!(router.dispatch("inference_complete", json!("inference_start")));
        assert_eq!(*seen.lock(), vec![json!("inference_start")]);
    }

    #[test]
    fn test_unhandled_signal_is_dropped() {
        let router = SignalRouter::new();
        let (seen, handler) = recorder();
        router.subscribe("a", handler);

        assert!(!router.dispatch("b", json!(1)));
        assert!(seen.lock().is_empty());
        assert!(router.is_subscribed("a"));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_second_subscribe_replaces() {
        let router = SignalRouter::new();
        let (first, h1) = recorder();
        let (second, h2) = recorder();

        router.subscribe("done", h1);
        router.subscribe("done", h2);
        router.dispatch("done", json!(true));

        assert!(first.lock().is_empty());
        assert_eq!(*second.lock(), vec![json!(true)]);
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let router = SignalRouter::new();
        let (seen, handler) = recorder();
        router.subscribe("done", handler);

        assert!(router.unsubscribe("done"));
        assert!(!router.unsubscribe("done"));
        assert!(!router.dispatch("done", json!(1)));
        assert!(seen.lock().is_empty());
        assert!(router.is_empty());
    }

    #[test]
    fn test_handler_may_resubscribe_itself() {
        let router = Arc::new(SignalRouter::new());
        let inner = Arc::clone(&router);
        let (seen, replacement) = recorder();
        let replacement = Arc::new(Mutex::new(Some(replacement)));

        router.subscribe("once", move |_| {
            if let Some(next) = replacement.lock().take() {
                inner.subscribe("once", next);
            }
        });

        router.dispatch("once", json!(1));
        router.dispatch("once", json!(2));
        assert_eq!(*seen.lock(), vec![json!(2)]);
    }
}
