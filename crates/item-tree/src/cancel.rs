//! Cancellation tokens for traversal calls.
//!
//! A walk checks its token before every store query, so a caller can
//! abandon a lookup between steps either by bumping the tracker's version
//! or by letting the token's deadline pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tracks the active lookup version for cancellation.
///
/// When a new lookup starts, call `next_version()` to get a new version
/// number. Lookups holding tokens for older versions observe themselves as
/// cancelled on their next check.
#[derive(Debug, Default, Clone)]
pub struct LookupVersionTracker {
    active_version: Arc<AtomicU64>,
}

impl LookupVersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the active version and returns the new version number.
    pub fn next_version(&self) -> u64 {
        self.active_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_version(&self) -> u64 {
        self.active_version.load(Ordering::SeqCst)
    }

    /// Creates a token that stays live while `version` is the active one.
    pub fn token_for_version(&self, version: u64) -> CancellationToken {
        CancellationToken {
            active_version: Some(Arc::clone(&self.active_version)),
            version,
            deadline: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    /// `None` for tokens not tied to a tracker.
    active_version: Option<Arc<AtomicU64>>,
    version: u64,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Creates a token that is never cancelled.
    #[inline]
    pub fn noop() -> Self {
        Self::default()
    }

    /// Cancels the token once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Cancels the token after `timeout`. A timeout past the clock's range
    /// leaves the token without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Returns `Some(())` if still active, `None` if cancelled.
    /// This enables use with the `?` operator for early returns.
    #[inline]
    pub fn is_cancelled(&self) -> Option<()> {
        if let Some(active) = &self.active_version {
            if active.load(Ordering::Relaxed) != self.version {
                return None;
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => None,
            _ => Some(()),
        }
    }
}
