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

//! Mnemos server: HTTP surface over the memory engine
//!
//! Binds the in-memory reference backends (single-process mode), wires the
//! ingest/query/consolidation services, runs the scheduler loop and the
//! task-queue worker pool, and serves the axum API. Production deployments
//! swap the backend bindings for external drivers; everything above the
//! capability traits stays the same.

pub mod api;
pub mod config;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mnemos_core::MnemosConfig;
use mnemos_memory::consolidation::{ConflictResolver, Dbscan};
use mnemos_memory::{
    IngestService, Reranker, Retriever, Scheduler, SurprisalSegmenter, Worker, Workspace,
};
use mnemos_store::{
    HeuristicLanguageModel, LocalTaskQueue, MemoryCoordinator, MemoryGraphStore, MemoryVectorStore,
};

use api::{router, AppState};
use config::ServerConfig;

/// Background resources owned by a running server.
pub struct Runtime {
    pub queue: Arc<LocalTaskQueue>,
    pub scheduler: Arc<Scheduler>,
}

/// Wire the engine over the in-memory backends.
pub fn build_local_state(memory: &MnemosConfig) -> (AppState, Runtime) {
    let dimensions = memory.embedding.dimensions;
    let provider = Arc::new(HeuristicLanguageModel::new(dimensions));
    let vector = Arc::new(MemoryVectorStore::new(dimensions));
    let graph = Arc::new(MemoryGraphStore::new());
    let coordinator = Arc::new(MemoryCoordinator::new());

    let segmenter = Arc::new(SurprisalSegmenter::new(
        provider.clone(),
        memory.segmentation.clone(),
    ));
    let ingest = Arc::new(IngestService::new(segmenter, vector.clone()));

    let retriever = Retriever::new(
        vector.clone(),
        graph.clone(),
        provider.clone(),
        memory.retrieval.clone(),
    );
    let reranker = Reranker::new(provider.clone(), memory.dig.clone());
    let workspace = Arc::new(Workspace::new(retriever, reranker, memory.knapsack.clone()));

    let consolidation = &memory.consolidation;
    let worker = Arc::new(Worker::new(
        vector.clone(),
        provider,
        coordinator.clone(),
        Dbscan::new(consolidation.dbscan_epsilon, consolidation.dbscan_min_points),
        ConflictResolver::new(graph.clone(), consolidation.decay_rate),
        consolidation.clone(),
    ));

    let queue = Arc::new(LocalTaskQueue::start(
        worker,
        consolidation.worker_concurrency,
        consolidation.lock_ttl(),
        consolidation.task_retries,
    ));

    let scheduler = Arc::new(Scheduler::new(
        vector,
        coordinator.clone(),
        queue.clone(),
        consolidation.clone(),
    ));

    let state = AppState {
        ingest,
        workspace,
        scheduler: scheduler.clone(),
        graph,
        coordinator,
        queue: queue.clone(),
    };

    (state, Runtime { queue, scheduler })
}

/// Initialize tracing, wire the engine, and serve until interrupted.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mnemos_server=info,mnemos_memory=info,mnemos_store=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting mnemos server");

    let (state, runtime) = build_local_state(&config.memory);

    // Scheduler tick loop, cancelled via the shutdown signal.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = {
        let scheduler = runtime.scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let mut app = router(state);
    if config.http.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&config.http.listen_addr).await?;
    info!(addr = %config.http.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    runtime.queue.shutdown().await;
    info!("mnemos server stopped");
    Ok(())
}
