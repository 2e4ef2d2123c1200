//! Refinement request assembly, batching, and round-trip telemetry.
//!
//! The manager is shared across the coordinator's dispatch tasks, so all of
//! its state is concurrent: timestamp maps in a concurrent map, counters as
//! atomics. Nothing here takes a lock at the API surface.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use meshforge_proto::{now_ms, KeyBytes, RefinementRequest, RefinementResponse};

/// A refinement request together with the rank it is addressed to.
///
/// The wire record carries only the requester side; the target rank lives
/// with the dispatch layer so batching can group by responder.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedRequest {
    pub target_rank: i32,
    pub request: RefinementRequest,
}

/// Telemetry snapshot for refinement request traffic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestStats {
    pub total_requests: u64,
    pub total_responses: u64,
    pub average_rtt_ms: f64,
}

/// Builds, batches, and times refinement requests.
#[derive(Debug, Default)]
pub struct RefinementRequestManager {
    /// Send timestamps keyed `req-{rank}-{round}`, matched on response.
    send_timestamps: DashMap<String, i64>,
    total_requests: AtomicU64,
    total_responses: AtomicU64,
    rtt_sum_ms: AtomicU64,
}

impl RefinementRequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble one request for the given round and boundary keys.
    pub fn build_request(
        &self,
        requester_rank: i32,
        requester_tree_id: i64,
        round_number: i32,
        boundary_keys: Vec<KeyBytes>,
        tree_level: i32,
    ) -> RefinementRequest {
        RefinementRequest {
            requester_rank,
            requester_tree_id,
            round_number,
            tree_level,
            boundary_keys,
            timestamp_ms: now_ms(),
        }
    }

    /// Group requests by responder rank, concatenating boundary-key lists
    /// into batches of at most `batch_size` keys.
    ///
    /// Within one target, request metadata (tree, round, level) is taken
    /// from the first request of the group.
    pub fn batch(&self, requests: Vec<AddressedRequest>, batch_size: usize) -> Vec<AddressedRequest> {
        let batch_size = batch_size.max(1);
        let mut by_target: Vec<(i32, Vec<AddressedRequest>)> = Vec::new();
        for request in requests {
            let slot = by_target
                .iter()
                .position(|(rank, _)| *rank == request.target_rank);
            match slot {
                Some(i) => by_target[i].1.push(request),
                None => by_target.push((request.target_rank, vec![request])),
            }
        }

        let mut batched = Vec::new();
        for (target_rank, group) in by_target {
            let template = group[0].request.clone();
            let keys: Vec<KeyBytes> = group
                .into_iter()
                .flat_map(|r| r.request.boundary_keys)
                .collect();

            if keys.is_empty() {
                batched.push(AddressedRequest {
                    target_rank,
                    request: template,
                });
                continue;
            }

            for chunk in keys.chunks(batch_size) {
                batched.push(AddressedRequest {
                    target_rank,
                    request: RefinementRequest {
                        boundary_keys: chunk.to_vec(),
                        ..template.clone()
                    },
                });
            }
        }
        batched
    }

    /// Record the send time of a request for later round-trip measurement.
    /// Keyed by the peer the request is addressed to, which is the rank the
    /// matching response will carry.
    pub fn track_request(&self, target_rank: i32, request: &RefinementRequest, sent_at_ms: i64) {
        let key = Self::tracking_key(target_rank, request.round_number);
        self.send_timestamps.insert(key, sent_at_ms);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Match a response to its request and fold the round-trip time into
    /// the running telemetry. Unmatched responses still count.
    pub fn track_response(&self, response: &RefinementResponse) {
        self.total_responses.fetch_add(1, Ordering::Relaxed);
        let key = Self::tracking_key(response.responder_rank, response.round_number);
        if let Some((_, sent_at_ms)) = self.send_timestamps.remove(&key) {
            let rtt = (now_ms() - sent_at_ms).max(0) as u64;
            self.rtt_sum_ms.fetch_add(rtt, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_responses(&self) -> u64 {
        self.total_responses.load(Ordering::Relaxed)
    }

    /// Mean round-trip of all matched responses, in milliseconds.
    pub fn average_rtt_ms(&self) -> f64 {
        let responses = self.total_responses.load(Ordering::Relaxed);
        if responses == 0 {
            return 0.0;
        }
        self.rtt_sum_ms.load(Ordering::Relaxed) as f64 / responses as f64
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            total_requests: self.total_requests(),
            total_responses: self.total_responses(),
            average_rtt_ms: self.average_rtt_ms(),
        }
    }

    /// Drop all telemetry and pending timestamps.
    pub fn clear(&self) {
        self.send_timestamps.clear();
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_responses.store(0, Ordering::Relaxed);
        self.rtt_sum_ms.store(0, Ordering::Relaxed);
    }

    fn tracking_key(rank: i32, round: i32) -> String {
        format!("req-{rank}-{round}")
    }
}
