//! Three-phase balance cycle orchestration.
//!
//! One `balance` call runs: local per-tree rebalancing (best-effort),
//! ghost exchange with the neighbor partitions, then the cross-partition
//! phase (parallel violation detection, butterfly aggregation, refinement
//! coordination). Any phase failure short-circuits into a failure result
//! carrying a metrics snapshot; the call always produces exactly one
//! [`BalanceResult`].

use parking_lot::RwLock;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use meshforge_core::{
    BalanceChecker, BalanceConfiguration, BalanceError, BalanceMetrics, BalanceResult,
    CoordinationResult, Forest, GhostKind, GhostLayer, GhostTransport, PartitionRegistry,
    PartnerExchange, RpcClient,
};
use meshforge_fault::InFlightOperationTracker;
use meshforge_proto::Violation;

use crate::aggregator::ViolationAggregator;
use crate::coordinator::{RefinementCoordinator, RoundContext};
use crate::violations::ParallelViolationDetector;

/// Forest and ghost view captured for the duration of one cycle and
/// cleared on every exit path.
struct CycleContext {
    forest: Arc<dyn Forest>,
    ghosts: GhostLayer,
}

/// Drives complete balance cycles over the distributed forest.
///
/// Safe for concurrent callers: configuration is immutable, metrics are
/// atomic, and the per-cycle context is stored atomically and read only by
/// that cycle's cross-partition phase. Every cycle registers with the
/// in-flight operation tracker so barrier recovery can quiesce the
/// balancer between cycles.
pub struct BalanceOrchestrator {
    config: BalanceConfiguration,
    registry: Arc<dyn PartitionRegistry>,
    transport: Arc<dyn GhostTransport>,
    metrics: Arc<BalanceMetrics>,
    tracker: Arc<InFlightOperationTracker>,
    aggregator: ViolationAggregator,
    coordinator: RefinementCoordinator,
    detector: ParallelViolationDetector,
    cycle: RwLock<Option<CycleContext>>,
}

impl BalanceOrchestrator {
    /// Build an orchestrator over the supplied collaborators. The
    /// configuration is validated before anything is constructed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BalanceConfiguration,
        registry: Arc<dyn PartitionRegistry>,
        transport: Arc<dyn GhostTransport>,
        checker: Arc<dyn BalanceChecker>,
        exchange: Arc<dyn PartnerExchange>,
        rpc: Arc<dyn RpcClient>,
        tracker: Arc<InFlightOperationTracker>,
    ) -> Result<Self, BalanceError> {
        let config = config.validated()?;
        let metrics = Arc::new(BalanceMetrics::new());
        let my_rank = registry.current_rank();
        let partition_count = registry.partition_count();

        let aggregator = ViolationAggregator::new(my_rank, partition_count, exchange);
        let coordinator = RefinementCoordinator::new(
            config.clone(),
            Arc::clone(&registry),
            rpc,
            Arc::clone(&metrics),
        )?;
        let detector = ParallelViolationDetector::new(checker, partition_count);

        Ok(Self {
            config,
            registry,
            transport,
            metrics,
            tracker,
            aggregator,
            coordinator,
            detector,
            cycle: RwLock::new(None),
        })
    }

    pub fn metrics(&self) -> Arc<BalanceMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &BalanceConfiguration {
        &self.config
    }

    /// Whether a balance cycle currently holds forest context.
    pub fn cycle_in_progress(&self) -> bool {
        self.cycle.read().is_some()
    }

    /// Run one balance cycle against the forest.
    ///
    /// Always returns exactly one result: success on convergence, timeout
    /// when the round cap was reached without convergence, failure with a
    /// diagnostic when a phase errored.
    pub async fn balance(&self, forest: Arc<dyn Forest>) -> BalanceResult {
        let _operation = self.tracker.begin_operation().await;
        self.metrics.cycle_started();
        info!(
            trees = forest.tree_count(),
            rank = self.registry.current_rank(),
            "balance cycle started"
        );

        let outcome = self.run_cycle(&forest).await;
        // Guaranteed release of the per-cycle context on every exit path.
        *self.cycle.write() = None;

        match outcome {
            Ok((refinements, coordination)) => {
                self.metrics.cycle_completed();
                if coordination.converged {
                    info!(
                        refinements,
                        rounds = coordination.rounds_executed,
                        "balance cycle converged"
                    );
                    BalanceResult::success(
                        refinements,
                        coordination.rounds_executed,
                        self.metrics.snapshot(),
                    )
                } else {
                    warn!(
                        rounds = coordination.rounds_executed,
                        "balance cycle hit the round cap without converging"
                    );
                    BalanceResult::timeout(
                        refinements,
                        coordination.rounds_executed,
                        self.metrics.snapshot(),
                    )
                }
            }
            Err(e) => {
                self.metrics.cycle_failed();
                error!(error = %e, "balance cycle failed");
                BalanceResult::failure(self.metrics.snapshot(), e.to_string())
            }
        }
    }

    /// Release the orchestrator's task resources.
    pub async fn shutdown(&self) {
        self.detector.shutdown().await;
    }

    async fn run_cycle(
        &self,
        forest: &Arc<dyn Forest>,
    ) -> Result<(u64, CoordinationResult), BalanceError> {
        let local_refinements = self.local_balance_phase(forest).await;

        let ghosts = self.ghost_exchange_phase(forest).await?;
        *self.cycle.write() = Some(CycleContext {
            forest: Arc::clone(forest),
            ghosts,
        });

        let coordination = self.cross_partition_phase().await?;
        Ok((
            local_refinements + coordination.refinements_applied,
            coordination,
        ))
    }

    /// Phase 1: enforce the invariant inside each local tree. Best-effort;
    /// a failing tree is logged and skipped.
    async fn local_balance_phase(&self, forest: &Arc<dyn Forest>) -> u64 {
        let mut modifications = 0u64;
        for tree in forest.trees() {
            match tree.rebalance().await {
                Ok(result) if result.success => {
                    debug!(
                        tree_id = result.tree_id,
                        modifications = result.modifications,
                        "tree rebalanced"
                    );
                    modifications += result.modifications;
                    self.metrics.tree_rebalanced();
                }
                Ok(result) => {
                    warn!(
                        tree_id = result.tree_id,
                        detail = result.detail.as_deref().unwrap_or("unspecified"),
                        "tree rebalance unsuccessful, continuing"
                    );
                }
                Err(e) => {
                    warn!(tree_id = tree.tree_id(), error = %e, "tree rebalance failed, continuing");
                }
            }
        }
        self.metrics.add_refinements(modifications);
        modifications
    }

    /// Phase 2: push boundary leaves to the neighbors, pull their boundary
    /// leaves into the local ghost view.
    async fn ghost_exchange_phase(
        &self,
        forest: &Arc<dyn Forest>,
    ) -> Result<GhostLayer, BalanceError> {
        self.transport
            .synchronize_all()
            .await
            .map_err(|e| BalanceError::phase("ghost-exchange", e.to_string()))?;

        let mut layer = GhostLayer::new();
        let neighbors = self.registry.neighbor_ranks();
        for tree in forest.trees() {
            let keys = tree.boundary_keys();
            for neighbor in &neighbors {
                let batch = self
                    .transport
                    .request_ghosts(*neighbor, tree.tree_id(), GhostKind::Faces, &keys)
                    .await
                    .map_err(|e| BalanceError::phase("ghost-exchange", e.to_string()))?;
                layer.extend(batch.elements);
            }
        }
        debug!(ghosts = layer.len(), "ghost layer assembled");
        Ok(layer)
    }

    /// Phase 3: detect violations against the captured cycle context,
    /// aggregate them globally, and coordinate refinement rounds to
    /// convergence.
    async fn cross_partition_phase(&self) -> Result<CoordinationResult, BalanceError> {
        let (forest, ghosts) = {
            let cycle = self.cycle.read();
            let context = cycle.as_ref().ok_or_else(|| {
                BalanceError::phase("cross-partition", "no forest context captured")
            })?;
            (Arc::clone(&context.forest), context.ghosts.clone())
        };

        let local_violations = self.detector.detect(&ghosts, forest).await?;
        debug!(count = local_violations.len(), "local violations detected");

        let global_violations = self.aggregator.aggregate(local_violations).await?;
        debug!(count = global_violations.len(), "global violations aggregated");

        // The coarser side of each violation is queued for refinement.
        for violation in &global_violations {
            if violation.local_level < violation.ghost_level {
                self.registry.request_refinement(&violation.local_key);
            }
        }

        let context = Self::round_context(&global_violations);
        self.coordinator.coordinate(&context).await
    }

    /// Boundary context for the refinement rounds: every violated local
    /// key, tagged with the deepest involved level.
    fn round_context(violations: &[Violation]) -> RoundContext {
        RoundContext {
            tree_id: violations.first().map(|v| v.tree_id).unwrap_or(0),
            tree_level: violations
                .iter()
                .map(|v| v.local_level.max(v.ghost_level))
                .max()
                .unwrap_or(0),
            boundary_keys: violations.iter().map(|v| v.local_key.clone()).collect(),
        }
    }
}
