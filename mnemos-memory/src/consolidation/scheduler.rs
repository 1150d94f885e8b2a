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

//! Consolidation scheduler
//!
//! Background loop that watches tenant activity and enqueues consolidation
//! tasks. A tenant qualifies when it has been inactive past the timeout OR
//! its pending-episode backlog crosses the threshold. A coordinator lock
//! (`consolidation:lock:<tenant>`, TTL-bounded) gates enqueues so repeated
//! ticks do not stack duplicate tasks; losing the race is not an error.
//! Execution itself is serialized by the worker's per-tenant run lock.
//! Per-tenant failures are logged and never escape the loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use mnemos_core::{
    config::ConsolidationConfig, ConsolidationTask, Coordinator, MemoryResult, TaskQueue,
    VectorStore,
};

/// Reason a tenant was picked up, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    InactivityTimeout,
    PendingBacklog,
}

impl TriggerReason {
    fn as_str(self) -> &'static str {
        match self {
            TriggerReason::InactivityTimeout => "inactivity_timeout",
            TriggerReason::PendingBacklog => "pending_backlog",
        }
    }
}

/// Periodic trigger-check loop feeding the task queue.
pub struct Scheduler {
    vector: Arc<dyn VectorStore>,
    coordinator: Arc<dyn Coordinator>,
    queue: Arc<dyn TaskQueue>,
    config: ConsolidationConfig,
    /// tenant -> last ingest/query activity
    last_activity: DashMap<String, DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        coordinator: Arc<dyn Coordinator>,
        queue: Arc<dyn TaskQueue>,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            vector,
            coordinator,
            queue,
            config,
            last_activity: DashMap::new(),
        }
    }

    /// Record tenant wakefulness. Called on every ingest and query.
    pub fn record_activity(&self, tenant_id: &str) {
        self.last_activity.insert(tenant_id.to_string(), Utc::now());
    }

    /// Run the tick loop until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            check_interval_secs = self.config.check_interval_secs,
            inactivity_timeout_secs = self.config.inactivity_timeout_secs,
            max_unconsolidated = self.config.max_unconsolidated,
            "consolidation scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all_tenants().await;
                }
                _ = shutdown.changed() => {
                    info!("consolidation scheduler stopped");
                    return;
                }
            }
        }
    }

    /// One pass over all known tenants.
    pub async fn check_all_tenants(&self) {
        let tenants: Vec<(String, DateTime<Utc>)> = self
            .last_activity
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        for (tenant_id, last_activity) in tenants {
            if let Err(e) = self.check_tenant(&tenant_id, last_activity).await {
                error!(tenant_id, error = %e, "scheduler check failed");
            }
        }
    }

    async fn check_tenant(
        &self,
        tenant_id: &str,
        last_activity: DateTime<Utc>,
    ) -> MemoryResult<()> {
        let Some(reason) = self.should_consolidate(tenant_id, last_activity).await else {
            return Ok(());
        };

        let lock_key = lock_key(tenant_id);
        let acquired = self
            .coordinator
            .set_if_absent(&lock_key, "locked", self.config.lock_ttl())
            .await?;
        if !acquired {
            debug!(tenant_id, "consolidation already running, skipping");
            return Ok(());
        }

        let task = ConsolidationTask {
            tenant_id: tenant_id.to_string(),
        };
        if let Err(e) = self.queue.enqueue(task).await {
            warn!(tenant_id, error = %e, "enqueue failed, releasing lock");
            self.coordinator.delete(&lock_key).await?;
            return Err(e);
        }

        info!(tenant_id, reason = reason.as_str(), "consolidation enqueued");
        Ok(())
    }

    /// OR-trigger: inactivity timeout, or pending backlog at the threshold.
    pub async fn should_consolidate(
        &self,
        tenant_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Option<TriggerReason> {
        let idle = (Utc::now() - last_activity)
            .to_std()
            .unwrap_or_default();
        if idle > self.config.inactivity_timeout() {
            return Some(TriggerReason::InactivityTimeout);
        }

        match self.vector.count_unconsolidated(tenant_id).await {
            Ok(count) if count >= self.config.max_unconsolidated => {
                Some(TriggerReason::PendingBacklog)
            }
            Ok(_) => None,
            Err(e) => {
                error!(tenant_id, error = %e, "pending count failed");
                None
            }
        }
    }
}

/// Coordinator key guarding one tenant's consolidation.
pub fn lock_key(tenant_id: &str) -> String {
    format!("consolidation:lock:{tenant_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use mnemos_core::{Episode, MemoryError, VectorStore};
    use mnemos_store::{MemoryCoordinator, MemoryVectorStore};

    struct RecordingQueue {
        enqueued: AtomicUsize,
        fail: bool,
    }

    impl RecordingQueue {
        fn new() -> Self {
            Self {
                enqueued: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TaskQueue for RecordingQueue {
        async fn enqueue(&self, _task: ConsolidationTask) -> MemoryResult<()> {
            if self.fail {
                return Err(MemoryError::ExternalService("queue full".into()));
            }
            self.enqueued.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> ConsolidationConfig {
        ConsolidationConfig {
            max_unconsolidated: 3,
            ..Default::default()
        }
    }

    async fn seed_pending(vector: &MemoryVectorStore, tenant: &str, n: usize) {
        for i in 0..n {
            vector
                .upsert(&[Episode::new(tenant, format!("ep {i}"), vec![1.0], 1.0)])
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn backlog_at_threshold_triggers_exactly_one_task() {
        let vector = Arc::new(MemoryVectorStore::new(1));
        seed_pending(&vector, "u1", 3).await;

        let coordinator = Arc::new(MemoryCoordinator::new());
        let queue = Arc::new(RecordingQueue::new());
        let scheduler = Scheduler::new(vector, coordinator.clone(), queue.clone(), config());

        scheduler.record_activity("u1");
        scheduler.check_all_tenants().await;
        assert_eq!(queue.enqueued.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_held(&lock_key("u1")));

        // A second tick before the lock expires enqueues nothing.
        scheduler.check_all_tenants().await;
        assert_eq!(queue.enqueued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn below_threshold_and_active_means_no_trigger() {
        let vector = Arc::new(MemoryVectorStore::new(1));
        seed_pending(&vector, "u1", 2).await;

        let scheduler = Scheduler::new(
            vector,
            Arc::new(MemoryCoordinator::new()),
            Arc::new(RecordingQueue::new()),
            config(),
        );

        let reason = scheduler.should_consolidate("u1", Utc::now()).await;
        assert!(reason.is_none());
    }

    #[tokio::test]
    async fn inactivity_triggers_even_with_empty_backlog() {
        let vector = Arc::new(MemoryVectorStore::new(1));
        let scheduler = Scheduler::new(
            vector,
            Arc::new(MemoryCoordinator::new()),
            Arc::new(RecordingQueue::new()),
            config(),
        );

        let stale = Utc::now() - chrono::Duration::minutes(16);
        let reason = scheduler.should_consolidate("u1", stale).await;
        assert_eq!(reason, Some(TriggerReason::InactivityTimeout));
    }

    #[tokio::test]
    async fn enqueue_failure_releases_the_lock() {
        let vector = Arc::new(MemoryVectorStore::new(1));
        seed_pending(&vector, "u1", 3).await;

        let coordinator = Arc::new(MemoryCoordinator::new());
        let queue = Arc::new(RecordingQueue {
            enqueued: AtomicUsize::new(0),
            fail: true,
        });
        let scheduler = Scheduler::new(vector, coordinator.clone(), queue, config());

        scheduler.record_activity("u1");
        scheduler.check_all_tenants().await;
        assert!(!coordinator.is_held(&lock_key("u1")));
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(MemoryVectorStore::new(1)),
            Arc::new(MemoryCoordinator::new()),
            Arc::new(RecordingQueue::new()),
            ConsolidationConfig {
                check_interval_secs: 3600,
                ..Default::default()
            },
        ));

        let (tx, rx) = watch::channel(false);
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(rx).await })
        };

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should drain promptly")
            .unwrap();
    }
}
