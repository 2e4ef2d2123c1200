//! Balance-cycle metrics.
//!
//! Counters are monotonic atomics updated from any thread; the round
//! duration histogram sits behind a short-critical-section lock. A
//! [`MetricsSnapshot`] is an immutable copy taken at one instant, attached
//! to every balance result.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide, thread-safe metrics for the balance engine.
///
/// Owned by the orchestrator and shared by handle; there is no module-level
/// singleton.
#[derive(Debug, Default)]
pub struct BalanceMetrics {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    rounds_executed: AtomicU64,
    refinements_applied: AtomicU64,
    trees_rebalanced: AtomicU64,
    round_durations: Mutex<Vec<Duration>>,
}

impl BalanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tree_rebalanced(&self) {
        self.trees_rebalanced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_refinements(&self, count: u64) {
        self.refinements_applied.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one completed refinement round and its measured duration.
    pub fn record_round(&self, duration: Duration) {
        self.rounds_executed.fetch_add(1, Ordering::Relaxed);
        self.round_durations.lock().push(duration);
    }

    /// Immutable copy of all counters and the round histogram at this
    /// instant.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self.round_durations.lock().clone();
        let total_round_time: Duration = durations.iter().sum();
        let max_round_time = durations.iter().max().copied().unwrap_or(Duration::ZERO);
        MetricsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            rounds_executed: self.rounds_executed.load(Ordering::Relaxed),
            refinements_applied: self.refinements_applied.load(Ordering::Relaxed),
            trees_rebalanced: self.trees_rebalanced.load(Ordering::Relaxed),
            total_round_time,
            max_round_time,
            round_count: durations.len(),
        }
    }
}

/// Point-in-time copy of the balance metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub rounds_executed: u64,
    pub refinements_applied: u64,
    pub trees_rebalanced: u64,
    /// Sum of all measured round durations.
    pub total_round_time: Duration,
    /// Longest single round observed.
    pub max_round_time: Duration,
    /// Number of rounds contributing to the histogram.
    pub round_count: usize,
}

impl MetricsSnapshot {
    /// Mean round duration, or zero when no rounds have run.
    pub fn average_round_time(&self) -> Duration {
        if self.round_count == 0 {
            return Duration::ZERO;
        }
        self.total_round_time / self.round_count as u32
    }
}
