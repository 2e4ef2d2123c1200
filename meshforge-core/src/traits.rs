//! Collaborator interfaces consumed by the balance engine.
//!
//! The engine core stops at these seams: spatial-index storage, ghost
//! transport, violation checking, partition membership, and RPC are all
//! supplied by the hosting system. Every trait here is mock-replaceable so
//! the protocol machinery can be exercised without a live mesh.

use async_trait::async_trait;
use std::sync::Arc;

use meshforge_proto::{
    GhostBatch, KeyBytes, RefinementRequest, RefinementResponse, Violation, ViolationBatch,
};

use crate::error::BalanceError;
use crate::ghost::{GhostKind, GhostLayer};
use crate::results::RebalanceResult;

/// Identifier of an entity stored at a leaf.
pub type EntityId = String;

/// An axis-aligned query region in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// One adaptive spatial tree (octree or tetrahedral tree) owned by the local
/// partition.
///
/// Single-tree rebalancing is a library primitive supplied by the hosting
/// spatial index; the engine only drives it and consumes its results.
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Identifier of this tree within the distributed forest.
    fn tree_id(&self) -> i64;

    /// Enforce the 2:1 invariant inside this tree alone.
    async fn rebalance(&self) -> Result<RebalanceResult, BalanceError>;

    /// Entities whose positions fall inside the query region.
    fn entities_in_region(&self, region: &Region) -> Vec<EntityId>;

    /// Whether a node with the given canonical key exists in this tree.
    fn has_node(&self, key: &[u8]) -> bool;

    /// Canonical keys of the leaves on this partition's boundary, in key
    /// order. These are the leaves neighbors need ghost copies of.
    fn boundary_keys(&self) -> Vec<KeyBytes>;
}

/// The local slice of the distributed forest.
pub trait Forest: Send + Sync {
    /// The trees held by this partition.
    fn trees(&self) -> Vec<Arc<dyn SpatialIndex>>;

    /// Number of trees held by this partition.
    fn tree_count(&self) -> usize;
}

/// Receiver of per-rank ghost synchronization outcomes.
///
/// The transport invokes these callbacks as each neighbor exchange settles;
/// the fault layer bridges them into the failure detector.
pub trait SyncCallback: Send + Sync {
    fn on_sync_success(&self, rank: i32);
    fn on_sync_failure(&self, rank: i32, cause: &str);
}

/// Transport for ghost-layer exchange with neighboring partitions.
#[async_trait]
pub trait GhostTransport: Send + Sync {
    /// Exchange boundary leaves with every neighbor. Resolves when all
    /// neighbor exchanges have settled (successfully or not); per-rank
    /// outcomes are delivered through the registered callbacks.
    async fn synchronize_all(&self) -> Result<(), BalanceError>;

    /// Register a callback for per-rank synchronization outcomes.
    fn register_sync_callback(&self, callback: Arc<dyn SyncCallback>);

    /// Pull ghost copies of specific remote leaves from their owner.
    async fn request_ghosts(
        &self,
        owner_rank: i32,
        tree_id: i64,
        kind: GhostKind,
        keys: &[KeyBytes],
    ) -> Result<GhostBatch, BalanceError>;
}

/// Detects 2:1 violations between the local forest and the ghost layer.
pub trait BalanceChecker: Send + Sync {
    fn find_violations(&self, ghosts: &GhostLayer, forest: &dyn Forest) -> Vec<Violation>;
}

/// Membership, topology, and synchronization for the partition group.
#[async_trait]
pub trait PartitionRegistry: Send + Sync {
    /// Rank of the local partition, in `[0, partition_count)`.
    fn current_rank(&self) -> i32;

    /// Total number of partitions in the group.
    fn partition_count(&self) -> i32;

    /// Ranks of the partitions sharing a boundary with the local one.
    fn neighbor_ranks(&self) -> Vec<i32>;

    /// Block until every partition has entered the barrier for `round`.
    ///
    /// Interruption surfaces as [`BalanceError::BarrierInterrupted`], which
    /// is fatal to the coordination cycle.
    async fn barrier(&self, round: i32) -> Result<(), BalanceError>;

    /// Record that the leaf with the given canonical key needs refinement in
    /// a later round.
    fn request_refinement(&self, key: &[u8]);

    /// Number of refinement requests not yet applied.
    fn pending_refinements(&self) -> usize;
}

/// Client side of the refinement RPC service.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Dispatch a refinement request to the target rank. The coordinator
    /// races this future against the configured per-request deadline.
    async fn request_refinement(
        &self,
        target_rank: i32,
        request: RefinementRequest,
    ) -> Result<RefinementResponse, BalanceError>;
}

/// The blocking pairwise exchange primitive the butterfly aggregator runs
/// on: send our accumulated batch to the partner and resolve with theirs.
#[async_trait]
pub trait PartnerExchange: Send + Sync {
    async fn exchange(
        &self,
        partner_rank: i32,
        batch: ViolationBatch,
    ) -> Result<ViolationBatch, BalanceError>;
}
