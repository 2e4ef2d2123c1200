//! Compact binary codec for protocol messages.
//!
//! Bincode is the wire form for everything crossing partition boundaries.
//! Encoding is deterministic for a given value, which the butterfly merge
//! relies on when hashing received violations.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Failure while encoding or decoding a protocol message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// Encode a protocol message into its compact wire form.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a protocol message from its compact wire form.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{
        GhostElement, RefinementRequest, RefinementResponse, Violation, ViolationBatch,
    };

    #[test]
    fn refinement_request_round_trips() {
        let req = RefinementRequest {
            requester_rank: 4,
            requester_tree_id: 11,
            round_number: 2,
            tree_level: 6,
            boundary_keys: vec![vec![0x01, 0x02], vec![0x03]],
            timestamp_ms: 1_700_000_123_456,
        };

        let bytes = encode(&req).unwrap();
        let decoded: RefinementRequest = decode(&bytes).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.requester_rank, 4);
        assert_eq!(decoded.round_number, 2);
        assert_eq!(decoded.boundary_keys.len(), 2);
    }

    #[test]
    fn refinement_response_round_trips() {
        let resp = RefinementResponse {
            responder_rank: 1,
            round_number: 3,
            ghost_elements: vec![GhostElement {
                spatial_key: vec![0xde, 0xad],
                entity_id: "entity-42".to_string(),
                content: vec![1, 2, 3, 4],
                position: [0.5, -1.25, 3.0],
                owner_rank: 1,
                tree_id: 9,
            }],
            more_refinement_needed: true,
            timestamp_ms: 1_700_000_200_000,
        };

        let bytes = encode(&resp).unwrap();
        let decoded: RefinementResponse = decode(&bytes).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn violation_batch_round_trips() {
        let batch = ViolationBatch {
            requester_rank: 0,
            responder_rank: 1,
            round_number: 0,
            timestamp_ms: 1_700_000_000_001,
            violations: vec![Violation {
                local_key: vec![0x10],
                ghost_key: vec![0x20],
                local_level: 4,
                ghost_level: 2,
                owner_rank: 1,
                tree_id: 0,
            }],
        };

        let bytes = encode(&batch).unwrap();
        let decoded: ViolationBatch = decode(&bytes).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn encoding_is_deterministic_for_identical_values() {
        let v = Violation {
            local_key: vec![9, 8, 7],
            ghost_key: vec![6, 5],
            local_level: 3,
            ghost_level: 1,
            owner_rank: 0,
            tree_id: 2,
        };
        assert_eq!(encode(&v).unwrap(), encode(&v.clone()).unwrap());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let req = RefinementRequest {
            requester_rank: 0,
            requester_tree_id: 0,
            round_number: 1,
            tree_level: 1,
            boundary_keys: vec![vec![0xaa; 16]],
            timestamp_ms: 0,
        };
        let bytes = encode(&req).unwrap();
        let result: Result<RefinementRequest, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }
}
