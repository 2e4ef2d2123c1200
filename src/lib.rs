//! # MeshForge
//!
//! MeshForge is a distributed 2:1-balanced refinement engine for
//! hierarchical spatial meshes (octrees and tetrahedral trees) partitioned
//! across many processes. Given a forest of adaptive trees whose leaves
//! carry arbitrary refinement levels, it drives the global mesh into the
//! 2:1 balance invariant (no two face-adjacent leaves differing in level
//! by more than one) with a message-efficient, fault-tolerant protocol.
//!
//! ## How a Balance Cycle Runs
//!
//! 1. **Local balance**: each tree of the local forest enforces the
//!    invariant internally through its own rebalance primitive.
//! 2. **Ghost exchange**: boundary leaves are exchanged with neighboring
//!    partitions so violations across partition boundaries become locally
//!    observable.
//! 3. **Cross-partition balance**: boundary violations are aggregated
//!    globally through a butterfly all-to-all in `ceil(log2 P)` rounds,
//!    then resolved by an iterative refinement coordinator with
//!    barrier-synchronized rounds, per-request timeouts, and early-exit on
//!    convergence.
//!
//! Throughout, a heartbeat failure detector watches partition health, and
//! a recovery coordinator can pause in-flight balance operations, run a
//! recovery strategy, and resume.
//!
//! ## Crate Layout
//!
//! - [`proto`]: wire-protocol value records and binary codecs.
//! - [`core`]: spatial-key abstraction, collaborator traits, error
//!   taxonomy, configuration, metrics, and result types.
//! - [`fault`]: failure detector, recovery strategies, in-flight operation
//!   tracking, and transport fault adapters.
//! - [`balance`]: the butterfly pattern, violation aggregator, refinement
//!   coordinator, parallel violation detector, and the three-phase
//!   orchestrator.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use meshforge::{
//!     BalanceConfiguration, BalanceOrchestrator, InFlightOperationTracker,
//! };
//!
//! let tracker = InFlightOperationTracker::new();
//! let orchestrator = BalanceOrchestrator::new(
//!     BalanceConfiguration::default(),
//!     registry,     // partition membership + barrier
//!     transport,    // ghost exchange
//!     checker,      // 2:1 violation detection
//!     exchange,     // butterfly pairwise exchange
//!     rpc,          // refinement request client
//!     Arc::clone(&tracker),
//! )?;
//!
//! let result = orchestrator.balance(forest).await;
//! assert!(result.is_success());
//! ```

pub use meshforge_balance as balance;
pub use meshforge_core as core;
pub use meshforge_fault as fault;
pub use meshforge_proto as proto;

pub use meshforge_balance::{
    butterfly, BalanceOrchestrator, ParallelViolationDetector, RefinementCoordinator,
    RefinementRequestManager, RoundContext, ViolationAggregator,
};
pub use meshforge_core::{
    canonicalize_keys, BalanceChecker, BalanceConfiguration, BalanceError, BalanceMetrics,
    BalanceResult, BalanceStatus, CoordinationResult, EntityId, Forest, GhostKind, GhostLayer,
    GhostTransport, MetricsSnapshot, PartitionRegistry, PartnerExchange, RebalanceResult, Region,
    RpcClient, SpatialIndex, SpatialKey, SyncCallback,
};
pub use meshforge_fault::{
    BarrierRecoveryStrategy, CascadingRecoveryStrategy, FailureDetectionConfig, FailureDetector,
    FaultEvent, FaultTolerantForest, GhostSyncFaultAdapter, InFlightOperationTracker,
    NoopRecoveryStrategy, PartitionHealth, RecoveryConfig, RecoveryCoordinator, RecoveryResult,
    RecoveryStrategy,
};
pub use meshforge_proto::{
    GhostBatch, GhostElement, KeyBytes, RefinementRequest, RefinementResponse, Violation,
    ViolationBatch,
};
