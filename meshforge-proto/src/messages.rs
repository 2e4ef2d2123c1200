//! Protocol message records for the distributed balance service.
//!
//! All types here are immutable value records copied across partition
//! boundaries. Dedup and matching semantics live with the types themselves:
//! violations are keyed by their `(local_key, ghost_key)` pair, responses are
//! matched to requests by `(peer rank, round number)`.

use serde::{Deserialize, Serialize};

/// Canonical byte encoding of a space-filling-curve key.
///
/// The encoding is produced once by the owning partition and treated as
/// opaque everywhere else. Equality is bitwise identity, which makes hashing
/// deterministic across peers.
pub type KeyBytes = Vec<u8>;

/// A recorded 2:1 balance violation between a local leaf and a ghost leaf
/// owned by a neighboring partition.
///
/// The record is immutable once created. At detection time the level gap
/// between the two leaves is strictly greater than one; refinement rounds
/// drive that gap back within bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Canonical key of the local leaf participating in the violation.
    pub local_key: KeyBytes,

    /// Canonical key of the remote (ghost) leaf.
    pub ghost_key: KeyBytes,

    /// Refinement level of the local leaf at detection time.
    pub local_level: i32,

    /// Refinement level of the ghost leaf at detection time.
    pub ghost_level: i32,

    /// Rank of the partition that owns the ghost leaf.
    pub owner_rank: i32,

    /// Identifier of the tree both leaves belong to.
    pub tree_id: i64,
}

impl Violation {
    /// Deduplication key: two violations with the same local and ghost key
    /// describe the same face, regardless of the other fields.
    pub fn dedup_key(&self) -> (&[u8], &[u8]) {
        (&self.local_key, &self.ghost_key)
    }

    /// Absolute refinement-level difference between the two leaves.
    pub fn level_gap(&self) -> i32 {
        (self.local_level - self.ghost_level).abs()
    }
}

/// One butterfly-round payload: every violation the sender has accumulated,
/// tagged with the exchange endpoints and round number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationBatch {
    /// Rank of the partition sending this batch.
    pub requester_rank: i32,

    /// Rank of the partner this batch is addressed to.
    pub responder_rank: i32,

    /// Zero-based butterfly round this batch belongs to.
    pub round_number: i32,

    /// Milliseconds since the Unix epoch when the batch was assembled.
    pub timestamp_ms: i64,

    /// The accumulated violation set (local plus everything learned so far).
    pub violations: Vec<Violation>,
}

/// A refinement request sent to the partner of one coordination round.
///
/// An empty `boundary_keys` list marks a heartbeat request: the sender has no
/// boundary work this round but still participates in the barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRequest {
    /// Rank of the requesting partition.
    pub requester_rank: i32,

    /// Tree the boundary keys belong to on the requester side.
    pub requester_tree_id: i64,

    /// One-based refinement round number.
    pub round_number: i32,

    /// Refinement level of the tree region the boundary keys were taken from.
    pub tree_level: i32,

    /// Canonical keys of the boundary leaves needing partner refinement.
    pub boundary_keys: Vec<KeyBytes>,

    /// Milliseconds since the Unix epoch when the request was sent.
    pub timestamp_ms: i64,
}

impl RefinementRequest {
    /// Whether this request carries no boundary work and only occupies a
    /// barrier slot.
    pub fn is_heartbeat(&self) -> bool {
        self.boundary_keys.is_empty()
    }
}

/// The partner's answer to a [`RefinementRequest`], matched by
/// `(responder_rank, round_number)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementResponse {
    /// Rank of the responding partition.
    pub responder_rank: i32,

    /// Round number this response answers.
    pub round_number: i32,

    /// Ghost copies of the leaves the responder refined this round.
    pub ghost_elements: Vec<GhostElement>,

    /// Whether the responder still has pending refinements after this round.
    pub more_refinement_needed: bool,

    /// Milliseconds since the Unix epoch when the response was produced.
    pub timestamp_ms: i64,
}

impl RefinementResponse {
    /// The substitute used when a partner times out or errors: no ghost
    /// elements and no further refinement signalled, so the round can
    /// complete on the barrier without the unresponsive peer.
    pub fn empty(responder_rank: i32, round_number: i32, timestamp_ms: i64) -> Self {
        Self {
            responder_rank,
            round_number,
            ghost_elements: Vec::new(),
            more_refinement_needed: false,
            timestamp_ms,
        }
    }
}

/// A read-only copy of a leaf owned by a neighboring partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostElement {
    /// Canonical key of the ghosted leaf.
    pub spatial_key: KeyBytes,

    /// Identifier of the entity stored at the leaf.
    pub entity_id: String,

    /// Opaque entity payload as serialized by the owner.
    pub content: Vec<u8>,

    /// Position of the entity in world coordinates.
    pub position: [f32; 3],

    /// Rank of the partition that owns the original leaf.
    pub owner_rank: i32,

    /// Tree the leaf belongs to.
    pub tree_id: i64,
}

/// A batch of ghost elements returned by a ghost-layer pull from one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhostBatch {
    /// Rank of the partition that produced the batch.
    pub owner_rank: i32,

    /// Tree the batch was extracted from.
    pub tree_id: i64,

    /// The ghosted leaves.
    pub elements: Vec<GhostElement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_violation() -> Violation {
        Violation {
            local_key: vec![0x01, 0x02, 0x03],
            ghost_key: vec![0x0a, 0x0b],
            local_level: 5,
            ghost_level: 3,
            owner_rank: 2,
            tree_id: 7,
        }
    }

    #[test]
    fn level_gap_is_absolute() {
        let v = sample_violation();
        assert_eq!(v.level_gap(), 2);

        let mut inverted = v.clone();
        inverted.local_level = 3;
        inverted.ghost_level = 5;
        assert_eq!(inverted.level_gap(), 2);
    }

    #[test]
    fn dedup_key_ignores_non_key_fields() {
        let a = sample_violation();
        let mut b = sample_violation();
        b.owner_rank = 9;
        b.ghost_level = 1;
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn heartbeat_requests_have_no_boundary_keys() {
        let req = RefinementRequest {
            requester_rank: 0,
            requester_tree_id: 1,
            round_number: 1,
            tree_level: 4,
            boundary_keys: vec![],
            timestamp_ms: 1_700_000_000_000,
        };
        assert!(req.is_heartbeat());

        let busy = RefinementRequest {
            boundary_keys: vec![vec![0xff]],
            ..req
        };
        assert!(!busy.is_heartbeat());
    }

    #[test]
    fn empty_response_signals_no_further_refinement() {
        let resp = RefinementResponse::empty(3, 2, 42);
        assert_eq!(resp.responder_rank, 3);
        assert_eq!(resp.round_number, 2);
        assert!(resp.ghost_elements.is_empty());
        assert!(!resp.more_refinement_needed);
    }
}
