//! Parallel violation detection over the ghost layer.
//!
//! The ghost-element list is split into `min(P, ncpu)` chunks, each handed
//! to a worker task holding a transient ghost view scoped to its chunk.
//! Results funnel through a channel: deterministic within a chunk,
//! unordered across chunks. The detector is a scoped resource; shutting it
//! down drains its task set within five seconds and aborts stragglers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use meshforge_core::{BalanceChecker, BalanceError, Forest, GhostLayer};
use meshforge_proto::Violation;

const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Fans the external balance checker out over chunks of the ghost layer.
pub struct ParallelViolationDetector {
    checker: Arc<dyn BalanceChecker>,
    partition_count: i32,
    tasks: Mutex<JoinSet<()>>,
    shut_down: AtomicBool,
}

impl ParallelViolationDetector {
    pub fn new(checker: Arc<dyn BalanceChecker>, partition_count: i32) -> Self {
        Self {
            checker,
            partition_count,
            tasks: Mutex::new(JoinSet::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Number of chunks the layer is split into for `element_count`
    /// elements.
    fn chunk_count(&self, element_count: usize) -> usize {
        (self.partition_count.max(1) as usize)
            .min(num_cpus::get())
            .min(element_count)
            .max(1)
    }

    /// Detect violations between the local forest and the ghost layer.
    pub async fn detect(
        &self,
        ghosts: &GhostLayer,
        forest: Arc<dyn Forest>,
    ) -> Result<Vec<Violation>, BalanceError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(BalanceError::Shutdown);
        }
        if ghosts.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_count = self.chunk_count(ghosts.len());
        let chunk_size = ghosts.len().div_ceil(chunk_count);
        debug!(
            elements = ghosts.len(),
            chunk_count, chunk_size, "dispatching violation detection"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Violation>>();
        {
            let mut tasks = self.tasks.lock().await;
            for chunk in 0..chunk_count {
                let scoped = ghosts.scoped(chunk * chunk_size, (chunk + 1) * chunk_size);
                let checker = Arc::clone(&self.checker);
                let forest = Arc::clone(&forest);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let found = checker.find_violations(&scoped, forest.as_ref());
                    let _ = tx.send(found);
                });
            }
        }
        drop(tx);

        let mut violations = Vec::new();
        while let Some(found) = rx.recv().await {
            violations.extend(found);
        }
        Ok(violations)
    }

    /// Release the detector: drain outstanding tasks within the deadline,
    /// aborting anything that exceeds it. Further `detect` calls fail.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        let mut tasks = self.tasks.lock().await;
        let drained = tokio::time::timeout(DRAIN_DEADLINE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("violation detector drain exceeded deadline, aborting tasks");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}
