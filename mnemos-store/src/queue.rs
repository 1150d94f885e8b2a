// Copyright 2025 Mnemos (https://github.com/mnemos-ai)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Process-local task queue
//!
//! Bounded mpsc channel drained by a pool of worker tasks. Each delivery
//! gets a per-attempt deadline and a retry budget; a task that exhausts its
//! budget is dropped with an error log. Stands in for an external queue
//! service behind the same [`TaskQueue`] contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mnemos_core::{
    ConsolidationHandler, ConsolidationTask, MemoryError, MemoryResult, TaskQueue,
};

const QUEUE_CAPACITY: usize = 256;

/// Process-local [`TaskQueue`] with an embedded worker pool.
pub struct LocalTaskQueue {
    tx: mpsc::Sender<ConsolidationTask>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalTaskQueue {
    /// Spawn `concurrency` workers delivering to `handler`, each attempt
    /// bounded by `task_timeout`, retried up to `retries` times.
    pub fn start(
        handler: Arc<dyn ConsolidationHandler>,
        concurrency: usize,
        task_timeout: Duration,
        retries: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<ConsolidationTask>(QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(concurrency.max(1));
        for worker_id in 0..concurrency.max(1) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let mut shutdown = shutdown_rx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let task = tokio::select! {
                        task = async { rx.lock().await.recv().await } => task,
                        _ = shutdown.changed() => None,
                    };
                    let Some(task) = task else {
                        debug!(worker_id, "queue worker exiting");
                        return;
                    };
                    run_with_retries(&*handler, &task, task_timeout, retries).await;
                }
            }));
        }

        info!(concurrency = concurrency.max(1), "task queue workers started");
        Self {
            tx,
            shutdown: shutdown_tx,
            workers: Mutex::new(workers),
        }
    }

    /// Signal workers to stop and wait for them to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn run_with_retries(
    handler: &dyn ConsolidationHandler,
    task: &ConsolidationTask,
    task_timeout: Duration,
    retries: usize,
) {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(task_timeout, handler.process(&task.tenant_id)).await;
        match outcome {
            Ok(Ok(())) => {
                debug!(tenant_id = %task.tenant_id, attempt, "task completed");
                return;
            }
            Ok(Err(e)) => {
                warn!(tenant_id = %task.tenant_id, attempt, error = %e, "task attempt failed");
            }
            Err(_) => {
                warn!(tenant_id = %task.tenant_id, attempt, "task attempt timed out");
            }
        }
    }
    error!(tenant_id = %task.tenant_id, attempts, "task dropped after exhausting retries");
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, task: ConsolidationTask) -> MemoryResult<()> {
        self.tx
            .try_send(task)
            .map_err(|e| MemoryError::ExternalService(format!("task queue: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl ConsolidationHandler for CountingHandler {
        async fn process(&self, _tenant_id: &str) -> MemoryResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(MemoryError::Internal("transient".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_enqueued_tasks() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        });
        let queue = LocalTaskQueue::start(handler.clone(), 2, Duration::from_secs(5), 3);

        for _ in 0..4 {
            queue
                .enqueue(ConsolidationTask {
                    tenant_id: "u1".into(),
                })
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let queue = LocalTaskQueue::start(handler.clone(), 1, Duration::from_secs(5), 3);

        queue
            .enqueue(ConsolidationTask {
                tenant_id: "u1".into(),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Two failed attempts plus the successful third.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        queue.shutdown().await;
    }
}
