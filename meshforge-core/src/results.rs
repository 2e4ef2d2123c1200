//! Result records produced by balance operations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::MetricsSnapshot;

/// Outcome of rebalancing a single tree inside the local partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceResult {
    /// Tree the rebalance ran against.
    pub tree_id: i64,

    /// Number of node refinements applied.
    pub modifications: u64,

    /// Whether the rebalance completed. An unsuccessful rebalance is logged
    /// and skipped; it does not abort the cycle.
    pub success: bool,

    /// Optional diagnostic detail from the tree balancer.
    pub detail: Option<String>,
}

impl RebalanceResult {
    pub fn success(tree_id: i64, modifications: u64) -> Self {
        Self {
            tree_id,
            modifications,
            success: true,
            detail: None,
        }
    }

    pub fn failure(tree_id: i64, detail: impl Into<String>) -> Self {
        Self {
            tree_id,
            modifications: 0,
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// Outcome of one cross-partition coordination run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationResult {
    /// Refinement rounds actually executed.
    pub rounds_executed: u32,

    /// Ghost elements applied as refinements across all rounds.
    pub refinements_applied: u64,

    /// Whether every responder reported no further refinement needed.
    pub converged: bool,

    /// Wall-clock time of the whole coordination run.
    pub total_duration: Duration,
}

/// Terminal status of a balance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStatus {
    /// Convergence reached.
    Success,
    /// Round cap reached without convergence.
    Timeout,
    /// A phase failed; see the diagnostic reason.
    Failure,
}

/// The single result every orchestrator invocation returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub status: BalanceStatus,

    /// Total refinements applied during the cycle (local plus
    /// cross-partition).
    pub refinements_applied: u64,

    /// Refinement rounds executed by the cross-partition phase.
    pub rounds_executed: u32,

    /// Metrics at the moment the result was produced.
    pub snapshot: MetricsSnapshot,

    /// Diagnostic string for timeout and failure outcomes.
    pub reason: Option<String>,
}

impl BalanceResult {
    pub fn success(refinements_applied: u64, rounds_executed: u32, snapshot: MetricsSnapshot) -> Self {
        Self {
            status: BalanceStatus::Success,
            refinements_applied,
            rounds_executed,
            snapshot,
            reason: None,
        }
    }

    pub fn timeout(refinements_applied: u64, rounds_executed: u32, snapshot: MetricsSnapshot) -> Self {
        Self {
            status: BalanceStatus::Timeout,
            refinements_applied,
            rounds_executed,
            snapshot,
            reason: Some("round cap reached without convergence".to_string()),
        }
    }

    pub fn failure(snapshot: MetricsSnapshot, reason: impl Into<String>) -> Self {
        Self {
            status: BalanceStatus::Failure,
            refinements_applied: 0,
            rounds_executed: 0,
            snapshot,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BalanceStatus::Success
    }
}
