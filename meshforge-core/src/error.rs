//! Error taxonomy for the balance engine.
//!
//! Conditions are distinguished by how they propagate, not by where they
//! originate: construction-time errors are never retried, round-level
//! timeouts are absorbed, barrier interruptions are fatal to the cycle.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the distributed balance engine.
#[derive(Debug, Error)]
pub enum BalanceError {
    /// A configuration record violated its documented range. Raised at
    /// construction, before any state is published; never retried.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The injected exchange primitive failed mid-round. Aborts the current
    /// aggregation round and propagates to the caller.
    #[error("partner exchange with rank {partner} failed in round {round}: {reason}")]
    PartnerExchangeFailed {
        partner: i32,
        round: i32,
        reason: String,
    },

    /// A per-request deadline fired inside a coordination round. Absorbed by
    /// the coordinator, which substitutes an empty response.
    #[error("refinement request to rank {0} timed out")]
    RequestTimedOut(i32),

    /// The round barrier was interrupted. Fatal: the coordinator aborts and
    /// the orchestrator returns a failure result.
    #[error("barrier interrupted at round {0}")]
    BarrierInterrupted(i32),

    /// An uncaught error inside one of the three balance phases. The
    /// orchestrator converts this into a failure result with a metrics
    /// snapshot.
    #[error("{phase} phase failed: {reason}")]
    PhaseFailed { phase: String, reason: String },

    /// A recovery strategy reported failure for the given partition.
    #[error("recovery of partition {0} failed: {1}")]
    RecoveryFailed(Uuid, String),

    /// The ghost transport or RPC layer reported a fault.
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol message could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The component has been shut down and accepts no further work.
    #[error("engine shut down")]
    Shutdown,
}

impl BalanceError {
    /// Wrap an arbitrary failure as a phase failure for the orchestrator.
    pub fn phase(phase: &str, reason: impl Into<String>) -> Self {
        Self::PhaseFailed {
            phase: phase.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<meshforge_proto::CodecError> for BalanceError {
    fn from(e: meshforge_proto::CodecError) -> Self {
        Self::Serialization(e.to_string())
    }
}
