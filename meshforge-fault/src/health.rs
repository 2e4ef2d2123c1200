//! Per-partition health state.

use serde::{Deserialize, Serialize};

/// Health state machine for one remote partition.
///
/// Transitions happen only on: a heartbeat (back to `Healthy`), a timeout
/// tick (`Healthy → Suspected → Failed`), an explicit sync-failure report
/// (`Healthy → Suspected`), or recovery completion (`Recovering → Healthy`
/// or back to `Failed`). Without a heartbeat or an explicit mark, health
/// never improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionHealth {
    /// Heartbeats are arriving inside the suspicion window.
    Healthy,

    /// Heartbeats have been silent past the suspect timeout, or a sync
    /// failure was reported.
    Suspected,

    /// Heartbeats have been silent past the failure timeout. A fault event
    /// has been (or is about to be) delivered to recovery.
    Failed,

    /// A recovery strategy is currently running for this partition.
    Recovering,
}

impl PartitionHealth {
    /// Whether a recovery strategy may be invoked in this state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Suspected | Self::Failed)
    }
}
