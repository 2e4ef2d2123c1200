//! Global violation aggregation over the butterfly pattern.
//!
//! Each partition seeds the exchange with its locally detected violations
//! and, round by round, swaps its entire accumulated set with the round's
//! partner. Merges use put-if-absent semantics keyed by
//! `(local key, ghost key)`, so the first-seen record wins for any non-key
//! fields and insertion order stays deterministic for downstream iteration.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use meshforge_core::{BalanceError, PartnerExchange};
use meshforge_proto::{now_ms, KeyBytes, Violation, ViolationBatch};

use crate::butterfly;

/// Runs the butterfly aggregation for one partition.
pub struct ViolationAggregator {
    my_rank: i32,
    partition_count: i32,
    exchange: Arc<dyn PartnerExchange>,
}

impl ViolationAggregator {
    pub fn new(my_rank: i32, partition_count: i32, exchange: Arc<dyn PartnerExchange>) -> Self {
        Self {
            my_rank,
            partition_count,
            exchange,
        }
    }

    /// Aggregate the local violation list into the deduplicated global set.
    ///
    /// A single partition returns its own set without touching the
    /// exchange. An exchange failure aborts the current round and
    /// propagates; the accumulated set is only extended after a round's
    /// batch has been fully received, so no partial state is published.
    pub async fn aggregate(
        &self,
        local_violations: Vec<Violation>,
    ) -> Result<Vec<Violation>, BalanceError> {
        let mut seen: HashSet<(KeyBytes, KeyBytes)> = HashSet::new();
        let mut accumulated: Vec<Violation> = Vec::new();
        for violation in local_violations {
            Self::merge(&mut seen, &mut accumulated, violation);
        }

        if self.partition_count <= 1 {
            return Ok(accumulated);
        }

        let schedule = butterfly::dissemination_schedule(self.partition_count);
        for (exchange_index, round) in schedule.into_iter().enumerate() {
            let Some(partner) = butterfly::partner(self.my_rank, round, self.partition_count)
            else {
                trace!(
                    rank = self.my_rank,
                    round,
                    "no butterfly partner this round, skipping"
                );
                continue;
            };

            let batch = ViolationBatch {
                requester_rank: self.my_rank,
                responder_rank: partner,
                round_number: exchange_index as i32,
                timestamp_ms: now_ms(),
                violations: accumulated.clone(),
            };
            debug!(
                rank = self.my_rank,
                partner,
                round,
                carried = batch.violations.len(),
                "butterfly exchange"
            );

            let received =
                self.exchange
                    .exchange(partner, batch)
                    .await
                    .map_err(|e| BalanceError::PartnerExchangeFailed {
                        partner,
                        round: exchange_index as i32,
                        reason: e.to_string(),
                    })?;

            for violation in received.violations {
                Self::merge(&mut seen, &mut accumulated, violation);
            }
        }

        debug!(
            rank = self.my_rank,
            total = accumulated.len(),
            "aggregation complete"
        );
        Ok(accumulated)
    }

    fn merge(
        seen: &mut HashSet<(KeyBytes, KeyBytes)>,
        accumulated: &mut Vec<Violation>,
        violation: Violation,
    ) {
        let key = (violation.local_key.clone(), violation.ghost_key.clone());
        if seen.insert(key) {
            accumulated.push(violation);
        }
    }
}
