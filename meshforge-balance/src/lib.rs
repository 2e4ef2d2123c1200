//! # MeshForge Distributed Balance Engine
//!
//! This crate implements the message-efficient protocol that drives a
//! partitioned adaptive mesh into the 2:1 balance invariant: no two
//! face-adjacent leaves may differ in refinement level by more than one.
//!
//! ## Protocol Overview
//!
//! One balance cycle runs three sequential phases:
//!
//! 1. **Local balance**: every tree of the local forest enforces the
//!    invariant internally through its own rebalance primitive.
//! 2. **Ghost exchange**: boundary leaves are exchanged with neighboring
//!    partitions so each side holds read-only ghost copies of the leaves
//!    across its boundary.
//! 3. **Cross-partition balance**: violations against the ghost layer are
//!    detected in parallel, aggregated globally through a butterfly
//!    all-to-all in `ceil(log2 P)` rounds, and resolved by an iterative
//!    refinement coordinator with barrier-synchronized rounds and
//!    early-exit on convergence.
//!
//! ## Components
//!
//! - **[`butterfly`]**: the pure partner function `rank XOR (1 << round)`
//!   and the round count.
//! - **[`ViolationAggregator`]**: runs the butterfly rounds over an
//!   injected pairwise exchange, deduplicating by `(local key, ghost key)`
//!   with first-seen-wins merges.
//! - **[`RefinementRequestManager`]**: request assembly, per-partner
//!   batching, and round-trip telemetry.
//! - **[`RefinementCoordinator`]**: the per-round partner-exchange /
//!   barrier / convergence-check loop.
//! - **[`ParallelViolationDetector`]**: chunked fan-out of the external
//!   balance checker over the ghost layer.
//! - **[`BalanceOrchestrator`]**: the three-phase driver owning
//!   configuration and metrics, producing exactly one
//!   [`BalanceResult`](meshforge_core::BalanceResult) per invocation.
//!
//! ## Fault Interaction
//!
//! Each cycle registers with the fault layer's in-flight operation tracker,
//! so barrier-based recovery can quiesce the balancer, run, and resume
//! without tearing down state. Per-request timeouts inside coordination
//! rounds are absorbed (an unresponsive peer costs its ghost contributions,
//! not the round); barrier interruption is the one fatal condition.

pub mod aggregator;
pub mod butterfly;
pub mod coordinator;
pub mod orchestrator;
pub mod requests;
pub mod violations;

pub use aggregator::ViolationAggregator;
pub use coordinator::{RefinementCoordinator, RoundContext};
pub use orchestrator::BalanceOrchestrator;
pub use requests::{AddressedRequest, RefinementRequestManager, RequestStats};
pub use violations::ParallelViolationDetector;
