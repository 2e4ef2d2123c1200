//! # MeshForge Core Abstractions
//!
//! This crate is the foundation of the MeshForge balance engine. It defines
//! everything the distributed balancing machinery shares but does not own:
//! the spatial-key abstraction, the collaborator interfaces the engine
//! consumes, the error taxonomy, configuration records, metrics, and the
//! result types every balance cycle produces.
//!
//! ## Architecture Overview
//!
//! MeshForge enforces the 2:1 balance invariant (no two face-adjacent
//! leaves of the distributed mesh may differ in refinement level by more
//! than one) across a forest of adaptive trees partitioned over many
//! processes. The core crate deliberately contains no protocol logic: it is
//! the seam between the balance engine (`meshforge-balance`), the fault
//! layer (`meshforge-fault`), and the spatial-index plumbing that hosts
//! them.
//!
//! ### Key Design Principles
//!
//! - **Opaque keys**: internal components never interpret spatial keys.
//!   Collaborators canonicalize keys to byte strings once, and everything
//!   downstream hashes and compares those bytes deterministically.
//! - **Mock-replaceable seams**: every collaborator is a trait
//!   ([`SpatialIndex`], [`Forest`], [`GhostTransport`], [`BalanceChecker`],
//!   [`PartitionRegistry`], [`RpcClient`]) so the engine is testable without
//!   a live mesh or transport.
//! - **Values across boundaries**: configuration records are immutable and
//!   validated at construction; results and snapshots are plain values.
//!   Shared mutable state is confined to metrics and the fault layer, held
//!   behind interior mutability.
//!
//! ## Error Handling
//!
//! [`BalanceError`] distinguishes error conditions by their recovery policy:
//! configuration errors surface at construction and are never retried,
//! partner-exchange failures abort an aggregation round, request timeouts
//! are absorbed inside a coordination round, and barrier interruptions are
//! fatal to the cycle.

pub mod config;
pub mod error;
pub mod ghost;
pub mod key;
pub mod metrics;
pub mod results;
pub mod traits;

pub use config::BalanceConfiguration;
pub use error::BalanceError;
pub use ghost::{GhostKind, GhostLayer};
pub use key::{canonicalize_keys, SpatialKey};
pub use metrics::{BalanceMetrics, MetricsSnapshot};
pub use results::{BalanceResult, BalanceStatus, CoordinationResult, RebalanceResult};
pub use traits::{
    BalanceChecker, EntityId, Forest, GhostTransport, PartitionRegistry, PartnerExchange, Region,
    RpcClient, SpatialIndex, SyncCallback,
};
