//! Type-safe identifiers.
//!
//! Connection identities are plain integers on the wire (they are embedded
//! in auth tokens), but a newtype keeps them from being confused with
//! counts and sizes inside the pool.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ConnectionId
// ============================================================================

/// Identity of one pool member.
///
/// Assigned at creation by an [`IdAllocator`]; unique for the process
/// lifetime and never reused, including across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw identifier.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    #[inline]
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ============================================================================
// IdAllocator
// ============================================================================

/// Monotonic source of [`ConnectionId`]s, starting at 1.
///
/// The counter only moves forward.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Creates an allocator whose first id is 1.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Takes the next identifier.
    #[inline]
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the identifier the next call to [`next_id`](Self::next_id)
    /// will hand out.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> ConnectionId {
        ConnectionId(self.next.load(Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================
