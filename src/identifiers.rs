//! Type-safe identifiers.
//!
//! Request identifiers are plain integers on the wire. The newtype keeps
//! them from being mixed up with other integers carried in command payloads.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// RequestId
// ============================================================================

/// Identifier correlating a request with its response.
///
/// Serialized as a bare JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestIdAllocator
// ============================================================================

/// Hands out strictly increasing request identifiers.
///
/// One allocator lives inside each session. Identifiers start at zero and
/// are never reused for the lifetime of the allocator.
#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    /// Creates an allocator starting at zero.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Allocates the next identifier.
    #[inline]
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the identifier the next call to [`next_id`](Self::next_id) will yield.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> RequestId {
        RequestId(self.next.load(Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use proptest::prelude::*;

    #[test]
    fn test_request_id_serializes_as_integer() {
        let json = serde_json::to_string(&RequestId::new(7)).expect("serialize");
        assert_eq!(json, "7");

        let id: RequestId = serde_json::from_str("42").expect("parse");
        assert_eq!(id.as_u64(), 42);
    }

    #[test]
    fn test_allocator_starts_at_zero() {
        let alloc = RequestIdAllocator::new();
        assert_eq!(alloc.peek(), RequestId::new(0));
        assert_eq!(alloc.next_id(), RequestId::new(0));
        assert_eq!(alloc.next_id(), RequestId::new(1));
        assert_eq!(alloc.peek(), RequestId::new(2));
    }

    #[test]
    fn test_allocator_unique_across_threads() {
        let alloc = Arc::new(RequestIdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || (0..250).map(|_| alloc.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<RequestId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread"))
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    proptest! {
        #[test]
        fn prop_ids_strictly_increasing(count in 1usize..500) {
            let alloc = RequestIdAllocator::new();
            let ids: Vec<_> = (0..count).map(|_| alloc.next_id()).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
