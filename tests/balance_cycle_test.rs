//! End-to-end balance cycles over an in-memory two-partition cluster.
//!
//! Both partitions run a real orchestrator each; the collaborator seams are
//! filled with channel-backed mocks: a loopback pairwise exchange for the
//! butterfly, a shared round barrier, and scripted refinement RPC peers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Barrier, Mutex as AsyncMutex};

use meshforge::{
    BalanceChecker, BalanceConfiguration, BalanceError, BalanceOrchestrator, BalanceStatus, Forest,
    GhostBatch, GhostElement, GhostKind, GhostLayer, InFlightOperationTracker, KeyBytes,
    PartitionRegistry, PartnerExchange, RebalanceResult, RefinementRequest, RefinementResponse,
    Region, RpcClient, SpatialIndex, SyncCallback, Violation, ViolationBatch,
};

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

struct MockTree {
    id: i64,
    modifications: u64,
}

#[async_trait]
impl SpatialIndex for MockTree {
    fn tree_id(&self) -> i64 {
        self.id
    }
    async fn rebalance(&self) -> Result<RebalanceResult, BalanceError> {
        Ok(RebalanceResult::success(self.id, self.modifications))
    }
    fn entities_in_region(&self, _region: &Region) -> Vec<String> {
        Vec::new()
    }
    fn has_node(&self, _key: &[u8]) -> bool {
        true
    }
    fn boundary_keys(&self) -> Vec<KeyBytes> {
        vec![vec![self.id as u8]]
    }
}

struct MockForest {
    trees: Vec<Arc<dyn SpatialIndex>>,
}

impl MockForest {
    fn single_tree(id: i64) -> Arc<dyn Forest> {
        Arc::new(Self {
            trees: vec![Arc::new(MockTree {
                id,
                modifications: 0,
            })],
        })
    }
}

impl Forest for MockForest {
    fn trees(&self) -> Vec<Arc<dyn SpatialIndex>> {
        self.trees.clone()
    }
    fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

/// Shared group state: one barrier per round, two participants each.
struct ClusterState {
    partition_count: i32,
    barriers: DashMap<i32, Arc<Barrier>>,
}

impl ClusterState {
    fn new(partition_count: i32) -> Arc<Self> {
        Arc::new(Self {
            partition_count,
            barriers: DashMap::new(),
        })
    }

    fn barrier_for(&self, round: i32) -> Arc<Barrier> {
        self.barriers
            .entry(round)
            .or_insert_with(|| Arc::new(Barrier::new(self.partition_count as usize)))
            .clone()
    }
}

struct MockRegistry {
    rank: i32,
    cluster: Arc<ClusterState>,
    refinement_requests: Mutex<Vec<KeyBytes>>,
}

impl MockRegistry {
    fn new(rank: i32, cluster: Arc<ClusterState>) -> Arc<Self> {
        Arc::new(Self {
            rank,
            cluster,
            refinement_requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PartitionRegistry for MockRegistry {
    fn current_rank(&self) -> i32 {
        self.rank
    }
    fn partition_count(&self) -> i32 {
        self.cluster.partition_count
    }
    fn neighbor_ranks(&self) -> Vec<i32> {
        (0..self.cluster.partition_count)
            .filter(|r| *r != self.rank)
            .collect()
    }
    async fn barrier(&self, round: i32) -> Result<(), BalanceError> {
        self.cluster.barrier_for(round).wait().await;
        Ok(())
    }
    fn request_refinement(&self, key: &[u8]) {
        self.refinement_requests.lock().push(key.to_vec());
    }
    fn pending_refinements(&self) -> usize {
        self.refinement_requests.lock().len()
    }
}

/// Transport whose sync always succeeds and whose ghost pulls return one
/// remote boundary leaf per neighbor.
struct EmptyTransport;

#[async_trait]
impl meshforge::GhostTransport for EmptyTransport {
    async fn synchronize_all(&self) -> Result<(), BalanceError> {
        Ok(())
    }
    fn register_sync_callback(&self, _callback: Arc<dyn SyncCallback>) {}
    async fn request_ghosts(
        &self,
        owner_rank: i32,
        tree_id: i64,
        _kind: GhostKind,
        _keys: &[KeyBytes],
    ) -> Result<GhostBatch, BalanceError> {
        Ok(GhostBatch {
            owner_rank,
            tree_id,
            elements: vec![GhostElement {
                spatial_key: vec![0xb0, owner_rank as u8],
                entity_id: format!("boundary-{owner_rank}"),
                content: vec![],
                position: [0.0; 3],
                owner_rank,
                tree_id,
            }],
        })
    }
}

/// Checker scripted with a fixed violation list per rank.
struct ScriptedChecker {
    violations: Vec<Violation>,
}

impl BalanceChecker for ScriptedChecker {
    fn find_violations(&self, _ghosts: &GhostLayer, _forest: &dyn Forest) -> Vec<Violation> {
        self.violations.clone()
    }
}

/// Loopback pairwise exchange shared by the whole group.
struct LoopbackBus {
    senders: HashMap<(i32, i32), mpsc::UnboundedSender<ViolationBatch>>,
    receivers: HashMap<(i32, i32), AsyncMutex<mpsc::UnboundedReceiver<ViolationBatch>>>,
}

impl LoopbackBus {
    fn new(partition_count: i32) -> Arc<Self> {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for from in 0..partition_count {
            for to in 0..partition_count {
                if from == to {
                    continue;
                }
                let (tx, rx) = mpsc::unbounded_channel();
                senders.insert((from, to), tx);
                receivers.insert((from, to), AsyncMutex::new(rx));
            }
        }
        Arc::new(Self { senders, receivers })
    }
}

struct LoopbackExchange {
    rank: i32,
    bus: Arc<LoopbackBus>,
}

#[async_trait]
impl PartnerExchange for LoopbackExchange {
    async fn exchange(
        &self,
        partner_rank: i32,
        batch: ViolationBatch,
    ) -> Result<ViolationBatch, BalanceError> {
        self.bus.senders[&(self.rank, partner_rank)]
            .send(batch)
            .map_err(|e| BalanceError::Transport(e.to_string()))?;
        let mut rx = self.bus.receivers[&(partner_rank, self.rank)].lock().await;
        rx.recv()
            .await
            .ok_or_else(|| BalanceError::Transport("peer hung up".to_string()))
    }
}

/// RPC peer scripted with per-round ghost counts; `more = false` always.
struct ScriptedRpc {
    responder_rank: i32,
    ghosts: usize,
}

#[async_trait]
impl RpcClient for ScriptedRpc {
    async fn request_refinement(
        &self,
        _target_rank: i32,
        request: RefinementRequest,
    ) -> Result<RefinementResponse, BalanceError> {
        Ok(RefinementResponse {
            responder_rank: self.responder_rank,
            round_number: request.round_number,
            ghost_elements: (0..self.ghosts)
                .map(|n| GhostElement {
                    spatial_key: vec![0xee, n as u8],
                    entity_id: format!("refined-{n}"),
                    content: vec![],
                    position: [0.0; 3],
                    owner_rank: self.responder_rank,
                    tree_id: 0,
                })
                .collect(),
            more_refinement_needed: false,
            timestamp_ms: meshforge::proto::now_ms(),
        })
    }
}

/// RPC peer that never answers.
struct SilentRpc;

#[async_trait]
impl RpcClient for SilentRpc {
    async fn request_refinement(
        &self,
        _target_rank: i32,
        _request: RefinementRequest,
    ) -> Result<RefinementResponse, BalanceError> {
        futures::future::pending().await
    }
}

fn cross_partition_violation() -> Violation {
    // Partition 0's coarse leaf against partition 1's deep leaf.
    Violation {
        local_key: vec![0x01],
        ghost_key: vec![0x02],
        local_level: 2,
        ghost_level: 4,
        owner_rank: 1,
        tree_id: 0,
    }
}

fn build_orchestrator(
    rank: i32,
    cluster: &Arc<ClusterState>,
    bus: &Arc<LoopbackBus>,
    registry: Arc<MockRegistry>,
    checker_violations: Vec<Violation>,
    rpc: Arc<dyn RpcClient>,
    config: BalanceConfiguration,
) -> BalanceOrchestrator {
    BalanceOrchestrator::new(
        config,
        registry,
        Arc::new(EmptyTransport),
        Arc::new(ScriptedChecker {
            violations: checker_violations,
        }),
        Arc::new(LoopbackExchange {
            rank,
            bus: Arc::clone(bus),
        }),
        rpc,
        InFlightOperationTracker::new(),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn two_partitions_resolve_one_violation_in_one_round() {
    init_tracing();
    let cluster = ClusterState::new(2);
    let bus = LoopbackBus::new(2);

    let registry0 = MockRegistry::new(0, Arc::clone(&cluster));
    let registry1 = MockRegistry::new(1, Arc::clone(&cluster));

    // Partition 0 detects the violation; its peer refines one leaf.
    let orchestrator0 = build_orchestrator(
        0,
        &cluster,
        &bus,
        Arc::clone(&registry0),
        vec![cross_partition_violation()],
        Arc::new(ScriptedRpc {
            responder_rank: 1,
            ghosts: 1,
        }),
        BalanceConfiguration::default(),
    );
    let orchestrator1 = build_orchestrator(
        1,
        &cluster,
        &bus,
        Arc::clone(&registry1),
        Vec::new(),
        Arc::new(ScriptedRpc {
            responder_rank: 0,
            ghosts: 0,
        }),
        BalanceConfiguration::default(),
    );

    let run0 = tokio::spawn(async move { orchestrator0.balance(MockForest::single_tree(0)).await });
    let run1 = tokio::spawn(async move { orchestrator1.balance(MockForest::single_tree(1)).await });

    let result0 = run0.await.unwrap();
    let result1 = run1.await.unwrap();

    assert_eq!(result0.status, BalanceStatus::Success);
    assert_eq!(result0.rounds_executed, 1);
    assert_eq!(result0.refinements_applied, 1);

    assert_eq!(result1.status, BalanceStatus::Success);
    assert_eq!(result1.rounds_executed, 1);

    // The butterfly carried the violation to both partitions: each queued
    // the coarse side for refinement.
    assert_eq!(registry0.pending_refinements(), 1);
    assert_eq!(registry1.pending_refinements(), 1);
}

#[tokio::test]
async fn unresponsive_peer_is_absorbed_and_the_cycle_succeeds() {
    init_tracing();
    let cluster = ClusterState::new(2);
    let bus = LoopbackBus::new(2);

    let config = BalanceConfiguration {
        request_timeout: Duration::from_millis(100),
        ..Default::default()
    };

    let registry0 = MockRegistry::new(0, Arc::clone(&cluster));
    let registry1 = MockRegistry::new(1, Arc::clone(&cluster));

    // Partition 0's peer never answers; partition 1's peer is healthy.
    let orchestrator0 = build_orchestrator(
        0,
        &cluster,
        &bus,
        registry0,
        vec![cross_partition_violation()],
        Arc::new(SilentRpc),
        config.clone(),
    );
    let orchestrator1 = build_orchestrator(
        1,
        &cluster,
        &bus,
        registry1,
        Vec::new(),
        Arc::new(ScriptedRpc {
            responder_rank: 0,
            ghosts: 2,
        }),
        config,
    );

    let run0 = tokio::spawn(async move { orchestrator0.balance(MockForest::single_tree(0)).await });
    let run1 = tokio::spawn(async move { orchestrator1.balance(MockForest::single_tree(1)).await });

    let result0 = run0.await.unwrap();
    let result1 = run1.await.unwrap();

    // The timed-out request is absorbed: partition 0 still completes the
    // round on the barrier and succeeds with zero refinements from its
    // silent peer.
    assert_eq!(result0.status, BalanceStatus::Success);
    assert_eq!(result0.rounds_executed, 1);
    assert_eq!(result0.refinements_applied, 0);

    // The responsive peer's refinements are unaffected.
    assert_eq!(result1.status, BalanceStatus::Success);
    assert_eq!(result1.refinements_applied, 2);
}

#[tokio::test]
async fn single_partition_with_balanced_tree_does_no_work() {
    init_tracing();
    let cluster = ClusterState::new(1);
    let bus = LoopbackBus::new(1);
    let registry = MockRegistry::new(0, Arc::clone(&cluster));

    let orchestrator = build_orchestrator(
        0,
        &cluster,
        &bus,
        registry,
        Vec::new(),
        Arc::new(ScriptedRpc {
            responder_rank: 0,
            ghosts: 0,
        }),
        BalanceConfiguration::default(),
    );

    let result = orchestrator.balance(MockForest::single_tree(0)).await;
    assert_eq!(result.status, BalanceStatus::Success);
    assert_eq!(result.refinements_applied, 0);
    assert_eq!(result.rounds_executed, 0);
}

#[tokio::test]
async fn repeated_cycles_stay_converged_once_balanced() {
    init_tracing();
    let cluster = ClusterState::new(1);
    let bus = LoopbackBus::new(1);
    let registry = MockRegistry::new(0, Arc::clone(&cluster));

    let orchestrator = build_orchestrator(
        0,
        &cluster,
        &bus,
        registry,
        Vec::new(),
        Arc::new(ScriptedRpc {
            responder_rank: 0,
            ghosts: 0,
        }),
        BalanceConfiguration::default(),
    );

    let forest = MockForest::single_tree(0);
    let first = orchestrator.balance(Arc::clone(&forest)).await;
    let second = orchestrator.balance(forest).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(second.refinements_applied, 0);
    assert_eq!(second.snapshot.cycles_completed, 2);
}
