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

//! End-to-end pipeline tests over the in-memory backends: ingest through
//! segmentation, query through the workspace, consolidate through the
//! worker, and watch facts move from the episodic to the semantic store.

use std::sync::Arc;

use mnemos_core::config::MnemosConfig;
use mnemos_core::{ConsolidationStatus, GraphStore, QueryRequest, VectorStore};
use mnemos_memory::consolidation::{ConflictResolver, Dbscan, Worker};
use mnemos_memory::{IngestService, Reranker, Retriever, SurprisalSegmenter, Workspace};
use mnemos_store::{HeuristicLanguageModel, MemoryCoordinator, MemoryGraphStore, MemoryVectorStore};

const DIMENSIONS: usize = 32;

struct Harness {
    vector: Arc<MemoryVectorStore>,
    graph: Arc<MemoryGraphStore>,
    ingest: IngestService,
    workspace: Workspace,
    worker: Worker,
}

fn harness() -> Harness {
    let config = MnemosConfig::default();
    let provider = Arc::new(HeuristicLanguageModel::new(DIMENSIONS));
    let vector = Arc::new(MemoryVectorStore::new(DIMENSIONS));
    let graph = Arc::new(MemoryGraphStore::new());

    let segmenter = Arc::new(SurprisalSegmenter::new(
        provider.clone(),
        config.segmentation.clone(),
    ));
    let ingest = IngestService::new(segmenter, vector.clone());

    let retriever = Retriever::new(
        vector.clone(),
        graph.clone(),
        provider.clone(),
        config.retrieval.clone(),
    );
    let reranker = Reranker::new(provider.clone(), config.dig.clone());
    let workspace = Workspace::new(retriever, reranker, config.knapsack.clone());

    let worker = Worker::new(
        vector.clone(),
        provider,
        Arc::new(MemoryCoordinator::new()),
        Dbscan::new(
            config.consolidation.dbscan_epsilon,
            config.consolidation.dbscan_min_points,
        ),
        ConflictResolver::new(graph.clone(), config.consolidation.decay_rate),
        config.consolidation.clone(),
    );

    Harness {
        vector,
        graph,
        ingest,
        workspace,
        worker,
    }
}

#[tokio::test]
async fn ingest_then_query_surfaces_episodic_memory() {
    let h = harness();

    h.ingest
        .ingest("u1", "alice lives_in paris", "user")
        .await
        .unwrap();
    h.ingest
        .ingest("u1", "bob prefers green tea", "user")
        .await
        .unwrap();

    h.workspace.add_turn("u1", "user", "alice lives_in paris");

    let response = h
        .workspace
        .query(&QueryRequest {
            tenant_id: "u1".into(),
            query: "where does alice live".into(),
            token_budget: None,
        })
        .await
        .unwrap();

    assert!(response.context.contains("## Current Query"));
    assert!(response.tokens_used <= response.token_budget);
    assert!(response
        .sources
        .iter()
        .any(|s| s.episode.as_ref().is_some_and(|e| e.content.contains("alice"))));
}

#[tokio::test]
async fn consolidation_moves_facts_to_the_graph_and_decays_episodes() {
    let h = harness();

    let response = h
        .ingest
        .ingest("u1", "alice lives_in paris", "user")
        .await
        .unwrap();
    assert!(response.segments >= 1);

    h.worker.run("u1").await.unwrap();

    // Facts are now in the semantic store.
    let current = h.graph.query_by_subject("u1", "alice").await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].to_entity, "paris");
    assert!(current[0].valid_to.is_none());

    // Episodes are marked and decayed; the backlog is drained.
    assert_eq!(h.vector.count_unconsolidated("u1").await.unwrap(), 0);
    for id in &response.episode_ids {
        let ep = h.vector.get(id).await.unwrap();
        assert_eq!(ep.consolidation_status, ConsolidationStatus::Consolidated);
        assert!(ep.decay_factor < 1.0);
    }
}

#[tokio::test]
async fn contradiction_across_runs_is_superseded() {
    let h = harness();

    h.ingest
        .ingest("u1", "alice lives_in paris", "user")
        .await
        .unwrap();
    h.worker.run("u1").await.unwrap();

    h.ingest
        .ingest("u1", "alice lives_in berlin", "user")
        .await
        .unwrap();
    h.worker.run("u1").await.unwrap();

    let current = h.graph.query_by_subject("u1", "alice").await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].to_entity, "berlin");

    let all = h.graph.all_relationships("u1").await;
    assert_eq!(all.len(), 2);
    let historic = all.iter().find(|r| r.to_entity == "paris").unwrap();
    assert!(historic.valid_to.is_some());
}

#[tokio::test]
async fn graph_facts_flow_back_into_queries_after_consolidation() {
    let h = harness();

    h.ingest
        .ingest("u1", "Alice lives_in Paris", "user")
        .await
        .unwrap();
    h.worker.run("u1").await.unwrap();

    // Capitalized entity seeds the graph probe.
    let response = h
        .workspace
        .query(&QueryRequest {
            tenant_id: "u1".into(),
            query: "What do we know about Alice".into(),
            token_budget: None,
        })
        .await
        .unwrap();

    assert!(response
        .sources
        .iter()
        .any(|s| !s.graph_facts.is_empty()));
}

#[tokio::test]
async fn tenants_stay_isolated_end_to_end() {
    let h = harness();

    h.ingest
        .ingest("u1", "alice lives_in paris", "user")
        .await
        .unwrap();
    h.ingest
        .ingest("u2", "carol lives_in tokyo", "user")
        .await
        .unwrap();

    h.worker.run("u1").await.unwrap();

    // u2's backlog is untouched and u2's graph is empty.
    assert_eq!(h.vector.count_unconsolidated("u2").await.unwrap(), 1);
    assert!(h.graph.query_by_subject("u2", "carol").await.unwrap().is_empty());

    let response = h
        .workspace
        .query(&QueryRequest {
            tenant_id: "u2".into(),
            query: "carol".into(),
            token_budget: None,
        })
        .await
        .unwrap();
    for source in &response.sources {
        if let Some(ep) = &source.episode {
            assert_eq!(ep.tenant_id, "u2");
        }
    }
}
