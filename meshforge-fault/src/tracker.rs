//! In-flight balance-operation tracking.
//!
//! Recovery needs two things from the balancer: stop admitting new cycles,
//! and know when the running ones have drained. The tracker provides both
//! with an atomic counter and a notification primitive; guards make the
//! count panic-safe.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Counts active balance operations and gates admission of new ones.
#[derive(Debug, Default)]
pub struct InFlightOperationTracker {
    active: AtomicUsize,
    paused: AtomicBool,
    changed: Notify,
}

impl InFlightOperationTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of balance operations currently in flight.
    pub fn active_operations(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Whether new operations are currently being held back.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Admit one operation, waiting while the tracker is paused. The
    /// returned guard releases the slot on drop.
    pub async fn begin_operation(self: &Arc<Self>) -> OperationGuard {
        loop {
            // Claim the slot first so pause followed by await_quiescence
            // observes us; back out if a pause raced in.
            self.active.fetch_add(1, Ordering::AcqRel);
            if !self.paused.load(Ordering::Acquire) {
                return OperationGuard {
                    tracker: Arc::clone(self),
                };
            }
            self.active.fetch_sub(1, Ordering::AcqRel);
            self.changed.notify_waiters();
            // Register for the resume wakeup, then re-check the gate so a
            // resume racing with registration is never missed.
            let reopened = self.changed.notified();
            if self.paused.load(Ordering::Acquire) {
                reopened.await;
            }
        }
    }

    /// Admit one operation only if the tracker is not paused.
    pub fn try_begin_operation(self: &Arc<Self>) -> Option<OperationGuard> {
        self.active.fetch_add(1, Ordering::AcqRel);
        if self.paused.load(Ordering::Acquire) {
            self.active.fetch_sub(1, Ordering::AcqRel);
            self.changed.notify_waiters();
            return None;
        }
        Some(OperationGuard {
            tracker: Arc::clone(self),
        })
    }

    /// Hold back new operations. Running ones are unaffected.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        debug!("operation tracker paused");
    }

    /// Re-admit operations and wake anything waiting at the gate.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.changed.notify_waiters();
        debug!("operation tracker resumed");
    }

    /// Wait until no operations are in flight, up to `deadline`. Returns
    /// whether quiescence was reached.
    pub async fn await_quiescence(&self, deadline: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                if self.active.load(Ordering::Acquire) == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(deadline, wait).await.is_ok()
    }
}

/// Releases one in-flight slot when dropped.
#[derive(Debug)]
pub struct OperationGuard {
    tracker: Arc<InFlightOperationTracker>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::AcqRel);
        self.tracker.changed.notify_waiters();
    }
}
