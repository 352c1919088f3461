//! View liveness flag.
//!
//! Teardown never aborts in-flight requests. A view checks its guard before
//! applying a late response to its own state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable liveness token owned by one view.
#[derive(Clone, Debug)]
pub struct ViewGuard {
    live: Arc<AtomicBool>,
}

impl ViewGuard {
    /// New live guard.
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the owning view is still mounted.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark the view torn down. Visible to every clone.
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Run `apply` only while the view is live; returns whether it ran.
    pub fn apply_if_live<T>(&self, value: T, apply: impl FnOnce(T)) -> bool {
        if !self.is_live() {
            tracing::debug!("[vote-sync] dropping late response for closed view");
            return false;
        }
        apply(value);
        true
    }
}

impl Default for ViewGuard {
    fn default() -> Self {
        Self::new()
    }
}
