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

//! Consolidation worker: the sleep cycle
//!
//! The only component that writes to the semantic store. One run:
//!
//! 1. fetch pending episodes (bounded batch)
//! 2. cluster them by embedding density
//! 3. per cluster: synthesize a gist, extract triples, resolve conflicts
//! 4. forgetting: mark members consolidated, then decay them
//!
//! A per-cluster failure skips that cluster only. Forgetting runs strictly
//! after all inserts; its failure aborts the task so the queue retries.
//! A crash mid-run leaves episodes pending and the next run replays them;
//! re-extracted triples are absorbed by the graph store's current-edge
//! upsert.
//!
//! Tasks enter through [`ConsolidationHandler::process`], which holds a
//! per-tenant run lock in the coordinator for the duration of the run.
//! Two tasks for the same tenant (a forced one racing a scheduled one,
//! or duplicates on separate pool workers) cannot both write; the loser
//! returns without work.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use mnemos_core::{
    config::ConsolidationConfig, ConsolidationHandler, Coordinator, LanguageModel, MemoryResult,
    VectorStore,
};

use super::clustering::Dbscan;
use super::conflict::ConflictResolver;

/// Coordinator key held while a tenant's consolidation run executes.
/// Distinct from the scheduler's enqueue gate, which only dedupes enqueues.
pub fn run_lock_key(tenant_id: &str) -> String {
    format!("consolidation:run:{tenant_id}")
}

/// Runs the consolidation pipeline for one tenant at a time.
pub struct Worker {
    vector: Arc<dyn VectorStore>,
    provider: Arc<dyn LanguageModel>,
    coordinator: Arc<dyn Coordinator>,
    clusterer: Dbscan,
    resolver: ConflictResolver,
    config: ConsolidationConfig,
}

impl Worker {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        provider: Arc<dyn LanguageModel>,
        coordinator: Arc<dyn Coordinator>,
        clusterer: Dbscan,
        resolver: ConflictResolver,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            vector,
            provider,
            coordinator,
            clusterer,
            resolver,
            config,
        }
    }

    /// Execute one full consolidation run for a tenant.
    pub async fn run(&self, tenant_id: &str) -> MemoryResult<()> {
        let episodes = self
            .vector
            .get_unconsolidated(tenant_id, self.config.batch_limit)
            .await?;
        if episodes.is_empty() {
            info!(tenant_id, "no pending episodes");
            return Ok(());
        }

        let clusters = self.clusterer.cluster(&episodes);
        info!(
            tenant_id,
            episodes = episodes.len(),
            clusters = clusters.len(),
            "clustering completed"
        );

        let mut total_conflicts = 0usize;
        let mut total_triples = 0usize;
        let mut consolidated_ids: Vec<String> = Vec::new();

        for cluster in &clusters {
            if cluster.episodes.is_empty() {
                continue;
            }

            let gist = match self.provider.synthesize(&cluster.episodes).await {
                Ok(gist) => gist,
                Err(e) => {
                    error!(tenant_id, cluster_id = cluster.id, error = %e, "synthesis failed");
                    continue;
                }
            };

            let triples = match self.provider.extract_triples(&gist).await {
                Ok(triples) => triples,
                Err(e) => {
                    error!(tenant_id, cluster_id = cluster.id, error = %e, "triple extraction failed");
                    continue;
                }
            };

            // Provenance points at the cluster's first episode.
            let source_episode_id = cluster.episodes[0].id.clone();
            match self
                .resolver
                .resolve_and_insert(tenant_id, &triples, &source_episode_id)
                .await
            {
                Ok((conflicts, inserted)) => {
                    total_conflicts += conflicts;
                    total_triples += inserted;
                }
                Err(e) => {
                    error!(tenant_id, cluster_id = cluster.id, error = %e, "resolve and insert failed");
                    continue;
                }
            }

            consolidated_ids.extend(cluster.episodes.iter().map(|ep| ep.id.clone()));
        }

        // Forgetting: strictly after all inserts.
        if !consolidated_ids.is_empty() {
            self.vector.mark_consolidated(&consolidated_ids).await?;
            if let Err(e) = self
                .vector
                .update_decay(&consolidated_ids, self.config.decay_rate)
                .await
            {
                warn!(tenant_id, error = %e, "decay update failed");
                return Err(e);
            }
        }

        info!(
            tenant_id,
            clusters = clusters.len(),
            triples_inserted = total_triples,
            conflicts_resolved = total_conflicts,
            episodes_consolidated = consolidated_ids.len(),
            "consolidation completed"
        );
        Ok(())
    }
}

#[async_trait]
impl ConsolidationHandler for Worker {
    /// Queue entry point: [`run`](Worker::run) under the per-tenant run
    /// lock. Losing the lock race is not an error; the task completes
    /// without work instead of retrying against the winner.
    async fn process(&self, tenant_id: &str) -> MemoryResult<()> {
        let lock_key = run_lock_key(tenant_id);
        let acquired = self
            .coordinator
            .set_if_absent(&lock_key, "running", self.config.lock_ttl())
            .await?;
        if !acquired {
            info!(tenant_id, "consolidation run already in progress, skipping");
            return Ok(());
        }

        let result = self.run(tenant_id).await;

        // A crashed run leaves the lock to its TTL.
        if let Err(e) = self.coordinator.delete(&lock_key).await {
            warn!(tenant_id, error = %e, "run lock release failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::{ConsolidationStatus, Episode, GraphStore, Triple, VectorStore};
    use mnemos_store::{
        HeuristicLanguageModel, MemoryCoordinator, MemoryGraphStore, MemoryVectorStore,
    };

    fn worker(
        vector: Arc<MemoryVectorStore>,
        graph: Arc<MemoryGraphStore>,
        coordinator: Arc<MemoryCoordinator>,
    ) -> Worker {
        let provider = Arc::new(HeuristicLanguageModel::new(8));
        let config = ConsolidationConfig::default();
        Worker::new(
            vector,
            provider,
            coordinator,
            Dbscan::new(config.dbscan_epsilon, config.dbscan_min_points),
            ConflictResolver::new(graph, config.decay_rate),
            config,
        )
    }

    async fn seed(vector: &MemoryVectorStore, contents: &[&str]) -> Vec<String> {
        let provider = HeuristicLanguageModel::new(8);
        let mut ids = Vec::new();
        for content in contents {
            let embedding = provider.embed(content).await.unwrap();
            let ep = Episode::new("u1", *content, embedding, 1.5);
            ids.push(ep.id.clone());
            vector.upsert(&[ep]).await.unwrap();
        }
        ids
    }

    #[tokio::test]
    async fn empty_backlog_is_a_noop() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        worker(vector.clone(), graph.clone(), coordinator)
            .run("u1")
            .await
            .unwrap();
        assert_eq!(graph.stats("u1").await.unwrap().relationship_count, 0);
    }

    #[tokio::test]
    async fn full_run_extracts_facts_and_forgets() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let ids = seed(&vector, &["alice lives_in paris", "bob works_at acme"]).await;

        worker(vector.clone(), graph.clone(), coordinator)
            .run("u1")
            .await
            .unwrap();

        // Facts extracted from the per-cluster gists landed in the graph.
        let stats = graph.stats("u1").await.unwrap();
        assert!(stats.current_relationship_count >= 2);

        // Forgetting: every member marked and decayed.
        for id in &ids {
            let ep = vector.get(id).await.unwrap();
            assert_eq!(ep.consolidation_status, ConsolidationStatus::Consolidated);
            assert!((ep.decay_factor - 0.95).abs() < 1e-9);
        }
        assert_eq!(vector.count_unconsolidated("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn conflicting_fact_supersedes_previous() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());

        graph
            .insert_triple("u1", &Triple::new("alice", "lives_in", "paris", 0.9), "ep0")
            .await
            .unwrap();

        seed(&vector, &["alice lives_in berlin"]).await;
        let coordinator = Arc::new(MemoryCoordinator::new());
        worker(vector.clone(), graph.clone(), coordinator)
            .run("u1")
            .await
            .unwrap();

        let current = graph.query_by_subject("u1", "alice").await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].to_entity, "berlin");

        let all = graph.all_relationships("u1").await;
        let historic = all.iter().find(|r| r.to_entity == "paris").unwrap();
        assert!(historic.valid_to.is_some());
        assert!((historic.confidence - 0.855).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rerun_after_consolidation_finds_nothing() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());
        seed(&vector, &["alice lives_in paris"]).await;

        let w = worker(vector.clone(), graph.clone(), Arc::new(MemoryCoordinator::new()));
        w.run("u1").await.unwrap();
        let after_first = graph.all_relationships("u1").await.len();

        w.run("u1").await.unwrap();
        assert_eq!(graph.all_relationships("u1").await.len(), after_first);
    }

    #[tokio::test]
    async fn process_skips_when_run_lock_is_held() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        seed(&vector, &["alice lives_in paris"]).await;

        // Another run holds the lock; this delivery is a no-op, not an
        // error, so the queue does not retry against the winner.
        coordinator
            .set_if_absent(
                &run_lock_key("u1"),
                "running",
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        let w = worker(vector.clone(), graph.clone(), coordinator);
        w.process("u1").await.unwrap();

        assert_eq!(graph.stats("u1").await.unwrap().relationship_count, 0);
        assert_eq!(vector.count_unconsolidated("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn process_releases_the_run_lock_after_completion() {
        let vector = Arc::new(MemoryVectorStore::new(8));
        let graph = Arc::new(MemoryGraphStore::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        seed(&vector, &["alice lives_in paris"]).await;

        let w = worker(vector.clone(), graph.clone(), coordinator.clone());
        w.process("u1").await.unwrap();
        assert!(!coordinator.is_held(&run_lock_key("u1")));

        // A forced delivery racing a scheduled one: the second pass sees
        // nothing pending but still takes and releases the lock cleanly.
        w.process("u1").await.unwrap();
        assert_eq!(graph.stats("u1").await.unwrap().current_relationship_count, 1);
    }
}
