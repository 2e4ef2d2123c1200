//! Partition recovery strategies and the coordinator that drives them.
//!
//! A strategy is invoked only when `can_recover` holds, which for the
//! provided implementations requires the partition to be `Suspected` or
//! `Failed`. The coordinator owns the attempt bookkeeping: it claims the
//! partition (`Recovering`), runs the strategy, and settles the state from
//! the result.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::detector::{FailureDetector, FaultEvent};
use crate::tracker::InFlightOperationTracker;
use meshforge_core::BalanceError;

/// Outcome of one recovery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub partition_id: Uuid,

    /// Wall-clock time the attempt took.
    pub duration: Duration,

    /// Name of the strategy that produced this result.
    pub strategy_name: String,

    /// Attempt number for this partition, filled in by the coordinator.
    pub attempts: u32,

    pub success: bool,

    /// Human-readable outcome description.
    pub message: String,

    /// Underlying error for failed attempts.
    pub cause: Option<String>,
}

impl RecoveryResult {
    pub fn success(
        partition_id: Uuid,
        duration: Duration,
        strategy_name: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            partition_id,
            duration,
            strategy_name: strategy_name.to_string(),
            attempts: 1,
            success: true,
            message: message.into(),
            cause: None,
        }
    }

    pub fn failure(
        partition_id: Uuid,
        duration: Duration,
        strategy_name: &str,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self {
            partition_id,
            duration,
            strategy_name: strategy_name.to_string(),
            attempts: 1,
            success: false,
            message: message.into(),
            cause,
        }
    }
}

/// The body a barrier recovery executes once the balancer is quiescent,
/// typically a ghost resynchronization with the affected partition.
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    async fn execute(&self, partition_id: Uuid) -> Result<(), BalanceError>;
}

/// A pluggable recovery procedure for one partition.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn strategy_name(&self) -> &'static str;

    fn config(&self) -> &RecoveryConfig;

    /// Whether this strategy applies to the partition in its current state.
    /// The default requires `Suspected` or `Failed`.
    async fn can_recover(&self, partition_id: Uuid, detector: &FailureDetector) -> bool {
        detector
            .check_health(partition_id)
            .map(|h| h.is_recoverable())
            .unwrap_or(false)
    }

    /// Run the recovery procedure. Always resolves to a result; internal
    /// errors become failure results with a cause, never panics or hangs
    /// past the configured deadlines.
    async fn recover(&self, partition_id: Uuid, detector: &FailureDetector) -> RecoveryResult;
}

/// Immediate (or artificially delayed) success. Testing only.
pub struct NoopRecoveryStrategy {
    config: RecoveryConfig,
    delay: Duration,
}

impl NoopRecoveryStrategy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(config: RecoveryConfig, delay: Duration) -> Self {
        Self { config, delay }
    }
}

#[async_trait]
impl RecoveryStrategy for NoopRecoveryStrategy {
    fn strategy_name(&self) -> &'static str {
        "noop"
    }

    fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    async fn recover(&self, partition_id: Uuid, _detector: &FailureDetector) -> RecoveryResult {
        let start = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        RecoveryResult::success(
            partition_id,
            start.elapsed(),
            self.strategy_name(),
            "no-op recovery completed",
        )
    }
}

/// Pause the balancer, drain in-flight operations, run the recovery
/// action, resume.
pub struct BarrierRecoveryStrategy {
    config: RecoveryConfig,
    tracker: Arc<InFlightOperationTracker>,
    action: Option<Arc<dyn RecoveryAction>>,
}

impl BarrierRecoveryStrategy {
    pub fn new(config: RecoveryConfig, tracker: Arc<InFlightOperationTracker>) -> Self {
        Self {
            config,
            tracker,
            action: None,
        }
    }

    pub fn with_action(
        config: RecoveryConfig,
        tracker: Arc<InFlightOperationTracker>,
        action: Arc<dyn RecoveryAction>,
    ) -> Self {
        Self {
            config,
            tracker,
            action: Some(action),
        }
    }

    async fn run_barrier_recovery(&self, partition_id: Uuid) -> RecoveryResult {
        let start = Instant::now();
        self.tracker.pause();

        let quiesced = self
            .tracker
            .await_quiescence(self.config.quiescence_timeout)
            .await;
        if !quiesced {
            self.tracker.resume();
            return RecoveryResult::failure(
                partition_id,
                start.elapsed(),
                self.strategy_name(),
                "in-flight operations did not drain before the quiescence deadline",
                None,
            );
        }
        debug!(%partition_id, "balancer quiescent, executing recovery action");

        let outcome = match &self.action {
            Some(action) => action.execute(partition_id).await,
            None => Ok(()),
        };
        self.tracker.resume();

        match outcome {
            Ok(()) => RecoveryResult::success(
                partition_id,
                start.elapsed(),
                self.strategy_name(),
                "barrier recovery completed",
            ),
            Err(e) => RecoveryResult::failure(
                partition_id,
                start.elapsed(),
                self.strategy_name(),
                "recovery action failed",
                Some(e.to_string()),
            ),
        }
    }
}

#[async_trait]
impl RecoveryStrategy for BarrierRecoveryStrategy {
    fn strategy_name(&self) -> &'static str {
        "barrier"
    }

    fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    async fn recover(&self, partition_id: Uuid, _detector: &FailureDetector) -> RecoveryResult {
        self.run_barrier_recovery(partition_id).await
    }
}

/// Barrier recovery for the target partition and then each of its
/// immediate neighbors, in the order the topology lists them.
pub struct CascadingRecoveryStrategy {
    barrier: BarrierRecoveryStrategy,
    /// Immediate neighbors per partition; filled once at startup.
    neighbors: HashMap<Uuid, Vec<Uuid>>,
}

impl CascadingRecoveryStrategy {
    pub fn new(barrier: BarrierRecoveryStrategy, neighbors: HashMap<Uuid, Vec<Uuid>>) -> Self {
        Self { barrier, neighbors }
    }
}

#[async_trait]
impl RecoveryStrategy for CascadingRecoveryStrategy {
    fn strategy_name(&self) -> &'static str {
        "cascading"
    }

    fn config(&self) -> &RecoveryConfig {
        self.barrier.config()
    }

    async fn recover(&self, partition_id: Uuid, _detector: &FailureDetector) -> RecoveryResult {
        let start = Instant::now();
        let mut targets = vec![partition_id];
        if let Some(neighbors) = self.neighbors.get(&partition_id) {
            targets.extend(neighbors.iter().copied());
        }

        let mut recovered = 0u32;
        for target in &targets {
            let result = self.barrier.run_barrier_recovery(*target).await;
            if !result.success {
                return RecoveryResult {
                    partition_id,
                    duration: start.elapsed(),
                    strategy_name: self.strategy_name().to_string(),
                    attempts: recovered + 1,
                    success: false,
                    message: format!(
                        "cascade stopped at partition {target} after {recovered} recoveries"
                    ),
                    cause: result.cause,
                };
            }
            recovered += 1;
        }

        RecoveryResult {
            partition_id,
            duration: start.elapsed(),
            strategy_name: self.strategy_name().to_string(),
            attempts: recovered,
            success: true,
            message: format!("cascading recovery over {recovered} partitions completed"),
            cause: None,
        }
    }
}

/// Consumes fault events and drives the recovery life cycle:
/// claim (`Recovering`) → strategy → settle (`Healthy` or back to
/// `Failed` for another detector-paced attempt, up to the attempt cap).
pub struct RecoveryCoordinator {
    detector: Arc<FailureDetector>,
    strategy: Arc<dyn RecoveryStrategy>,
    attempts: DashMap<Uuid, u32>,
}

impl RecoveryCoordinator {
    pub fn new(detector: Arc<FailureDetector>, strategy: Arc<dyn RecoveryStrategy>) -> Arc<Self> {
        Arc::new(Self {
            detector,
            strategy,
            attempts: DashMap::new(),
        })
    }

    /// Spawn the event loop over the detector's fault stream.
    pub fn start(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<FaultEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        info!(
            strategy = coordinator.strategy.strategy_name(),
            "starting recovery coordinator"
        );
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                coordinator.handle_fault(event).await;
            }
            debug!("fault event stream closed, recovery coordinator stopping");
        })
    }

    /// Process one fault event. Returns the strategy result when a recovery
    /// ran, `None` when the event was filtered.
    pub async fn handle_fault(&self, event: FaultEvent) -> Option<RecoveryResult> {
        let partition_id = event.partition_id;

        if !self
            .strategy
            .can_recover(partition_id, &self.detector)
            .await
        {
            debug!(%partition_id, "strategy declined recovery");
            return None;
        }

        let attempt = {
            let mut counter = self.attempts.entry(partition_id).or_insert(0);
            *counter += 1;
            *counter
        };
        let max_attempts = self.strategy.config().max_attempts;
        if attempt > max_attempts {
            error!(%partition_id, max_attempts, "recovery budget exhausted, quarantining partition");
            self.detector.quarantine(partition_id);
            return None;
        }
        if attempt > 1 {
            tokio::time::sleep(self.strategy.config().retry_delay).await;
        }

        info!(%partition_id, attempt, strategy = self.strategy.strategy_name(), "starting recovery");
        self.detector.mark_recovering(partition_id);

        let mut result = self.strategy.recover(partition_id, &self.detector).await;
        result.attempts = attempt;

        if result.success {
            info!(%partition_id, attempt, "recovery succeeded");
            self.detector.mark_healthy(partition_id);
            self.attempts.remove(&partition_id);
        } else {
            warn!(
                %partition_id,
                attempt,
                cause = result.cause.as_deref().unwrap_or("unknown"),
                "recovery failed, partition stays failed"
            );
            // Back to Failed with the notification flag cleared: the next
            // detector tick re-delivers and we try again.
            self.detector.mark_failed(partition_id);
        }
        Some(result)
    }
}
