//! Heartbeat-driven failure detector.
//!
//! Each known partition carries `(last_heartbeat, status)`. A background
//! loop evaluates timeouts every check interval; heartbeats and explicit
//! reports mutate state immediately. The detector is unreliable by design:
//! it suspects and fails partitions on silence, it does not reach
//! agreement about them.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FailureDetectionConfig;
use crate::health::PartitionHealth;
use meshforge_core::BalanceError;

/// Delivered to the recovery coordinator exactly once per `Failed`
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Partition that crossed the failure timeout.
    pub partition_id: Uuid,

    /// Wall-clock time of the detection.
    pub detected_at: DateTime<Utc>,

    /// Silence observed at detection time.
    pub since_heartbeat: Duration,
}

#[derive(Debug)]
struct PartitionState {
    last_heartbeat: Instant,
    status: PartitionHealth,
    /// Set when the fault event for the current failure has been delivered;
    /// cleared by heartbeat or recovery so a later failure notifies again.
    fault_notified: bool,
}

/// Heartbeat failure detector for the partition group.
///
/// Shared by handle between the transport adapter, the recovery
/// coordinator, and the background check loop. All state lives in a
/// concurrent map with per-entry updates; no lock spans an I/O operation.
pub struct FailureDetector {
    config: FailureDetectionConfig,
    partitions: DashMap<Uuid, PartitionState>,
    fault_tx: mpsc::UnboundedSender<FaultEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl FailureDetector {
    /// Build a detector and the fault-event stream the recovery coordinator
    /// consumes. The configuration is validated before any state exists.
    pub fn new(
        config: FailureDetectionConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<FaultEvent>), BalanceError> {
        let config = config.validated()?;
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let detector = Arc::new(Self {
            config,
            partitions: DashMap::new(),
            fault_tx,
            shutdown_tx,
        });
        Ok((detector, fault_rx))
    }

    /// Make a partition known to the detector, starting it `Healthy` with a
    /// fresh heartbeat.
    pub fn register_partition(&self, partition_id: Uuid) {
        self.partitions.insert(
            partition_id,
            PartitionState {
                last_heartbeat: Instant::now(),
                status: PartitionHealth::Healthy,
                fault_notified: false,
            },
        );
        debug!(%partition_id, "partition registered with failure detector");
    }

    /// Record a heartbeat: the partition returns to `Healthy` no matter
    /// what state it was in.
    pub fn record_heartbeat(&self, partition_id: Uuid) {
        match self.partitions.get_mut(&partition_id) {
            Some(mut state) => {
                state.last_heartbeat = Instant::now();
                if state.status != PartitionHealth::Healthy {
                    info!(%partition_id, from = ?state.status, "heartbeat restored partition to healthy");
                }
                state.status = PartitionHealth::Healthy;
                state.fault_notified = false;
            }
            None => {
                self.register_partition(partition_id);
            }
        }
    }

    /// Current health of a partition, or `None` for one the detector has
    /// never seen.
    pub fn check_health(&self, partition_id: Uuid) -> Option<PartitionHealth> {
        self.partitions.get(&partition_id).map(|s| s.status)
    }

    /// Force a `Healthy → Suspected` transition regardless of heartbeat
    /// freshness, on a reported synchronization failure. States worse than
    /// `Healthy` are left alone.
    pub fn report_sync_failure(&self, partition_id: Uuid) {
        match self.partitions.get_mut(&partition_id) {
            Some(mut state) => {
                if state.status == PartitionHealth::Healthy {
                    warn!(%partition_id, "sync failure reported, suspecting partition");
                    state.status = PartitionHealth::Suspected;
                }
            }
            None => {
                warn!(%partition_id, "sync failure reported for unknown partition, ignoring");
            }
        }
    }

    /// Recovery-success callback: return the partition to `Healthy` with a
    /// fresh heartbeat window.
    pub fn mark_healthy(&self, partition_id: Uuid) {
        match self.partitions.get_mut(&partition_id) {
            Some(mut state) => {
                state.status = PartitionHealth::Healthy;
                state.last_heartbeat = Instant::now();
                state.fault_notified = false;
            }
            None => {
                warn!(%partition_id, "mark_healthy for unknown partition, ignoring");
            }
        }
    }

    /// Claim a partition for an in-progress recovery attempt. Timeout ticks
    /// leave `Recovering` entries alone until recovery completes.
    pub fn mark_recovering(&self, partition_id: Uuid) {
        if let Some(mut state) = self.partitions.get_mut(&partition_id) {
            state.status = PartitionHealth::Recovering;
        }
    }

    /// Recovery-failure callback: the partition returns to `Failed`. The
    /// notification flag is cleared so the next check tick re-delivers a
    /// fault event for another attempt.
    pub fn mark_failed(&self, partition_id: Uuid) {
        if let Some(mut state) = self.partitions.get_mut(&partition_id) {
            state.status = PartitionHealth::Failed;
            state.fault_notified = false;
        }
    }

    /// Permanently silence fault events for a partition that exhausted its
    /// recovery budget. It stays `Failed` until a heartbeat arrives.
    pub fn quarantine(&self, partition_id: Uuid) {
        if let Some(mut state) = self.partitions.get_mut(&partition_id) {
            state.status = PartitionHealth::Failed;
            state.fault_notified = true;
        }
    }

    /// All partitions currently known to the detector.
    pub fn known_partitions(&self) -> Vec<Uuid> {
        self.partitions.iter().map(|e| *e.key()).collect()
    }

    /// Spawn the background timeout-evaluation loop. The loop runs until
    /// [`FailureDetector::shutdown`] is called.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let detector = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(
            check_interval_ms = self.config.check_interval.as_millis() as u64,
            "starting failure detector"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(detector.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => detector.evaluate_timeouts(),
                    _ = shutdown_rx.changed() => {
                        info!("failure detector stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the background loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One evaluation pass over every known partition.
    fn evaluate_timeouts(&self) {
        let now = Instant::now();
        for mut entry in self.partitions.iter_mut() {
            let partition_id = *entry.key();
            let state = entry.value_mut();

            // Recovery owns the state until it reports back.
            if state.status == PartitionHealth::Recovering {
                continue;
            }

            let elapsed = now.saturating_duration_since(state.last_heartbeat);
            if elapsed > self.config.failure_timeout {
                if state.status != PartitionHealth::Failed {
                    warn!(%partition_id, silent_ms = elapsed.as_millis() as u64, "partition failed");
                }
                state.status = PartitionHealth::Failed;
                if !state.fault_notified {
                    state.fault_notified = true;
                    let event = FaultEvent {
                        partition_id,
                        detected_at: Utc::now(),
                        since_heartbeat: elapsed,
                    };
                    if self.fault_tx.send(event).is_err() {
                        debug!(%partition_id, "no recovery listener for fault event");
                    }
                }
            } else if elapsed > self.config.suspect_timeout {
                if state.status == PartitionHealth::Healthy {
                    warn!(%partition_id, silent_ms = elapsed.as_millis() as u64, "partition suspected");
                    state.status = PartitionHealth::Suspected;
                }
            }
            // Within the suspect window: leave the state unchanged.
        }
    }
}
