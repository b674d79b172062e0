// Cancellation and request-ordering primitives shared by the session modes

use crate::models::pose::AngleMode;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Explicit per-session cancellation token.
///
/// Every async chain started for a mode carries a clone; results are applied
/// only while the token is live. Cancelling is synchronous and permanent.
#[derive(Debug, Clone, Default)]
pub struct LivenessToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_live(&self) -> bool {
        !self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if !self.is_live() {
                return;
            }
            notified.await;
        }
    }
}

/// Monotonic request counter for one slot; only the newest ticket may apply
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding every earlier one
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::Acquire) == ticket
    }

    /// Supersede any in-flight request without starting a new one
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }
}

/// Shared angle mode; readers see the mode in force when they apply a result
#[derive(Debug, Clone)]
pub struct AngleModeCell {
    inner: Arc<AtomicU8>,
}

impl AngleModeCell {
    pub fn new(mode: AngleMode) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(Self::encode(mode))),
        }
    }

    pub fn get(&self) -> AngleMode {
        match self.inner.load(Ordering::Acquire) {
            1 => AngleMode::Spatial,
            _ => AngleMode::Planar,
        }
    }

    pub fn set(&self, mode: AngleMode) {
        self.inner.store(Self::encode(mode), Ordering::Release);
    }

    fn encode(mode: AngleMode) -> u8 {
        match mode {
            AngleMode::Planar => 0,
            AngleMode::Spatial => 1,
        }
    }
}

/// Counters of results applied to and dropped from session state
#[derive(Debug, Default)]
pub struct ResultCounters {
    frames_applied: AtomicU64,
    results_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_applied: u64,
    pub results_dropped: u64,
}

impl ResultCounters {
    pub fn frame_applied(&self) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn result_dropped(&self) {
        self.results_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_applied: self.frames_applied.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
        }
    }
}
