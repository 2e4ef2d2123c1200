//! # MeshForge Fault Detection and Recovery
//!
//! This crate keeps a distributed balance run alive when partitions
//! misbehave. It provides heartbeat-driven failure detection, pluggable
//! recovery strategies, and the adapters that bridge transport-level sync
//! outcomes into partition health state.
//!
//! ## Architecture Overview
//!
//! The fault layer is deliberately unreliable in the formal sense: the
//! detector is a heartbeat/timeout suspicion mechanism, not a consensus
//! protocol. Its job is operational: notice silent partitions quickly,
//! pause in-flight balance work, run a recovery strategy, and resume.
//!
//! ### Components
//!
//! - **[`FailureDetector`]**: per-partition health state machine
//!   (`Healthy → Suspected → Failed`, plus `Recovering`) driven by
//!   heartbeats, timeout ticks, and explicit sync-failure reports. A
//!   background loop evaluates timeouts on a fixed check interval and
//!   delivers each failure event exactly once.
//! - **[`RecoveryCoordinator`]**: consumes fault events, gates them through
//!   the configured strategy's `can_recover`, and drives the
//!   `Recovering → Healthy` (or back to `Failed`) transitions with
//!   bounded retry attempts.
//! - **Recovery strategies**: no-op (testing), barrier (quiesce all
//!   in-flight balance operations, run the recovery action, resume), and
//!   cascading (barrier recovery for the target and its immediate
//!   neighbors in topological order).
//! - **[`InFlightOperationTracker`]**: the counter/notification primitive
//!   that lets recovery wait for active balance cycles to drain.
//! - **[`GhostSyncFaultAdapter`]**: routes the ghost transport's per-rank
//!   sync callbacks into detector state, translating ranks to partition
//!   identities through a write-once map.

pub mod adapter;
pub mod config;
pub mod detector;
pub mod health;
pub mod recovery;
pub mod tracker;

pub use adapter::{FaultTolerantForest, GhostSyncFaultAdapter};
pub use config::{FailureDetectionConfig, RecoveryConfig};
pub use detector::{FailureDetector, FaultEvent};
pub use health::PartitionHealth;
pub use recovery::{
    BarrierRecoveryStrategy, CascadingRecoveryStrategy, NoopRecoveryStrategy, RecoveryAction,
    RecoveryCoordinator, RecoveryResult, RecoveryStrategy,
};
pub use tracker::{InFlightOperationTracker, OperationGuard};
