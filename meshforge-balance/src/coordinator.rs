//! Iterative cross-partition refinement coordination.
//!
//! The coordinator drives at most `min(ceil(log2 P), max_rounds)` rounds.
//! Each round exchanges refinement requests with the butterfly partner,
//! waits on the group barrier, and checks convergence. Request-level
//! timeouts are absorbed with substituted empty responses so one slow peer
//! cannot fail a round; only barrier interruption is fatal.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use meshforge_core::{
    BalanceConfiguration, BalanceError, BalanceMetrics, CoordinationResult, PartitionRegistry,
    RpcClient,
};
use meshforge_proto::{now_ms, KeyBytes, RefinementResponse};

use crate::butterfly;
use crate::requests::{AddressedRequest, RefinementRequestManager};

/// Caller-provided context captured for the requests of one coordination
/// run: which tree the boundary belongs to and the keys needing partner
/// refinement.
#[derive(Debug, Clone, Default)]
pub struct RoundContext {
    pub tree_id: i64,
    pub tree_level: i32,
    pub boundary_keys: Vec<KeyBytes>,
}

/// Internal protocol state, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundState {
    Init,
    RoundActive(u32),
    AtBarrier(u32),
    Converged,
    TimedOut,
}

/// Drives barrier-synchronized refinement rounds against the partition
/// group.
pub struct RefinementCoordinator {
    config: BalanceConfiguration,
    registry: Arc<dyn PartitionRegistry>,
    rpc: Arc<dyn RpcClient>,
    requests: Arc<RefinementRequestManager>,
    metrics: Arc<BalanceMetrics>,
}

impl RefinementCoordinator {
    pub fn new(
        config: BalanceConfiguration,
        registry: Arc<dyn PartitionRegistry>,
        rpc: Arc<dyn RpcClient>,
        metrics: Arc<BalanceMetrics>,
    ) -> Result<Self, BalanceError> {
        Ok(Self {
            config: config.validated()?,
            registry,
            rpc,
            requests: Arc::new(RefinementRequestManager::new()),
            metrics,
        })
    }

    /// Request telemetry for this coordinator.
    pub fn request_manager(&self) -> &RefinementRequestManager {
        &self.requests
    }

    /// Run refinement rounds up to the configured cap.
    pub async fn coordinate(
        &self,
        context: &RoundContext,
    ) -> Result<CoordinationResult, BalanceError> {
        self.coordinate_with_limit(context, self.config.max_rounds)
            .await
    }

    /// Run refinement rounds with an explicit round cap. A cap of zero
    /// returns immediately without sending anything.
    pub async fn coordinate_with_limit(
        &self,
        context: &RoundContext,
        max_rounds: u32,
    ) -> Result<CoordinationResult, BalanceError> {
        let partition_count = self.registry.partition_count();
        let my_rank = self.registry.current_rank();
        let start = Instant::now();

        let target_rounds = butterfly::required_rounds(partition_count).min(max_rounds);
        let mut state = RoundState::Init;
        debug!(
            my_rank,
            partition_count,
            target_rounds,
            state = ?state,
            "starting refinement coordination"
        );

        if target_rounds == 0 {
            return Ok(CoordinationResult {
                rounds_executed: 0,
                refinements_applied: 0,
                converged: true,
                total_duration: start.elapsed(),
            });
        }

        let mut rounds_executed = 0u32;
        let mut refinements_applied = 0u64;
        let mut converged = false;

        for round in 1..=target_rounds {
            let round_start = Instant::now();
            state = RoundState::RoundActive(round);
            debug!(round, state = ?state, "refinement round started");

            let partner = butterfly::partner(my_rank, round - 1, partition_count);
            let responses = match partner {
                Some(partner_rank) => self.exchange_with_partner(partner_rank, round, context).await,
                None => {
                    debug!(round, "no partner this round");
                    Vec::new()
                }
            };

            let round_refinements: u64 = responses
                .iter()
                .map(|r| r.ghost_elements.len() as u64)
                .sum();
            refinements_applied += round_refinements;
            self.metrics.add_refinements(round_refinements);

            state = RoundState::AtBarrier(round);
            debug!(round, state = ?state, "entering barrier");
            self.registry.barrier(round as i32).await?;

            rounds_executed = round;
            self.metrics.record_round(round_start.elapsed());

            // Converged iff every responder reported no further refinement.
            let more_needed = responses.iter().any(|r| r.more_refinement_needed);
            if !more_needed {
                converged = true;
                state = RoundState::Converged;
                break;
            }
        }

        if !converged {
            state = RoundState::TimedOut;
        }
        info!(
            rounds_executed,
            refinements_applied,
            converged,
            state = ?state,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refinement coordination finished"
        );

        Ok(CoordinationResult {
            rounds_executed,
            refinements_applied,
            converged,
            total_duration: start.elapsed(),
        })
    }

    /// Build, batch, and dispatch this round's requests to the partner in
    /// parallel, racing each against the per-request deadline.
    async fn exchange_with_partner(
        &self,
        partner_rank: i32,
        round: u32,
        context: &RoundContext,
    ) -> Vec<RefinementResponse> {
        let my_rank = self.registry.current_rank();
        let request = self.requests.build_request(
            my_rank,
            context.tree_id,
            round as i32,
            context.boundary_keys.clone(),
            context.tree_level,
        );
        let batches = self.requests.batch(
            vec![AddressedRequest {
                target_rank: partner_rank,
                request,
            }],
            self.config.batch_size,
        );

        let dispatches = batches.into_iter().map(|batch| self.dispatch(batch));
        futures::future::join_all(dispatches).await
    }

    /// Send one request; a timeout or RPC error substitutes an empty
    /// response so the round can still complete on the barrier.
    async fn dispatch(&self, addressed: AddressedRequest) -> RefinementResponse {
        let AddressedRequest {
            target_rank,
            request,
        } = addressed;
        let round = request.round_number;
        self.requests
            .track_request(target_rank, &request, request.timestamp_ms);

        let send = self.rpc.request_refinement(target_rank, request);
        match tokio::time::timeout(self.config.request_timeout, send).await {
            Ok(Ok(response)) => {
                self.requests.track_response(&response);
                response
            }
            Ok(Err(e)) => {
                warn!(target_rank, round, error = %e, "refinement request failed, substituting empty response");
                RefinementResponse::empty(target_rank, round, now_ms())
            }
            Err(_) => {
                warn!(target_rank, round, "refinement request timed out, substituting empty response");
                RefinementResponse::empty(target_rank, round, now_ms())
            }
        }
    }
}
