//! Cooperative cancellation for engine runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag requesting that a run be stopped.
///
/// Clones observe the same flag, so a test harness or caller-side timer can
/// hold one clone while the run polls another. Cancelling a finished run has
/// no effect.
///
/// # Example
///
/// ```
/// use lintbridge_engine::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any
    /// clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
