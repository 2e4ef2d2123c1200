//! Bridges between the transport layer and the fault machinery.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::detector::FailureDetector;
use crate::tracker::InFlightOperationTracker;
use meshforge_core::{Forest, SpatialIndex, SyncCallback};

/// Routes the ghost transport's per-rank sync outcomes into detector state.
///
/// The transport speaks ranks; the detector speaks partition identities.
/// The rank map is filled once at startup and read-only thereafter. Unknown
/// ranks are logged and ignored so a misbehaving callback can never crash
/// the transport.
pub struct GhostSyncFaultAdapter {
    detector: Arc<FailureDetector>,
    ranks: DashMap<i32, Uuid>,
}

impl GhostSyncFaultAdapter {
    pub fn new(detector: Arc<FailureDetector>) -> Self {
        Self {
            detector,
            ranks: DashMap::new(),
        }
    }

    /// Associate a rank with its partition identity. Called once per rank
    /// during startup, before the transport is live.
    pub fn register_rank(&self, rank: i32, partition_id: Uuid) {
        self.ranks.insert(rank, partition_id);
        self.detector.register_partition(partition_id);
        debug!(rank, %partition_id, "rank registered with fault adapter");
    }

    /// Partition identity for a rank, if one was registered.
    pub fn partition_for(&self, rank: i32) -> Option<Uuid> {
        self.ranks.get(&rank).map(|e| *e.value())
    }
}

impl SyncCallback for GhostSyncFaultAdapter {
    fn on_sync_success(&self, rank: i32) {
        match self.partition_for(rank) {
            Some(partition_id) => self.detector.mark_healthy(partition_id),
            None => warn!(rank, "sync success for unknown rank, ignoring"),
        }
    }

    fn on_sync_failure(&self, rank: i32, cause: &str) {
        match self.partition_for(rank) {
            Some(partition_id) => {
                warn!(rank, %partition_id, cause, "ghost sync failure");
                self.detector.report_sync_failure(partition_id);
            }
            None => warn!(rank, cause, "sync failure for unknown rank, ignoring"),
        }
    }
}

/// Decorates a forest with in-flight operation tracking.
///
/// Reads pass straight through; the decorator only ties balance cycles run
/// against this forest to the shared tracker so barrier recovery can
/// quiesce them.
pub struct FaultTolerantForest {
    inner: Arc<dyn Forest>,
    tracker: Arc<InFlightOperationTracker>,
}

impl FaultTolerantForest {
    pub fn new(inner: Arc<dyn Forest>, tracker: Arc<InFlightOperationTracker>) -> Self {
        Self { inner, tracker }
    }

    /// The tracker the orchestrator must register its cycles with.
    pub fn tracker(&self) -> Arc<InFlightOperationTracker> {
        Arc::clone(&self.tracker)
    }
}

impl Forest for FaultTolerantForest {
    fn trees(&self) -> Vec<Arc<dyn SpatialIndex>> {
        self.inner.trees()
    }

    fn tree_count(&self) -> usize {
        self.inner.tree_count()
    }
}
