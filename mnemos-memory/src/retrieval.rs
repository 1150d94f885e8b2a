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

//! Hybrid retrieval
//!
//! The query read path probes episodic and semantic memory concurrently:
//! top-K cosine search over the vector store, and a bounded traversal of
//! the knowledge graph seeded by entities mentioned in the query. Results
//! are merged vector-first and deduplicated. One failed probe degrades to
//! the other's results; both failing fails the request.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use mnemos_core::{
    config::RetrievalConfig, GraphStore, LanguageModel, MemoryError, MemoryResult,
    RetrievalResult, VectorStore,
};

/// Concurrent vector + graph retriever.
pub struct Retriever {
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    provider: Arc<dyn LanguageModel>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        provider: Arc<dyn LanguageModel>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            graph,
            provider,
            config,
        }
    }

    /// Retrieve and merge candidates for a query, under the configured
    /// wall-clock deadline.
    pub async fn retrieve(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        match tokio::time::timeout(self.config.timeout(), self.retrieve_inner(tenant_id, query))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(MemoryError::Timeout(format!(
                "retrieval exceeded {}s",
                self.config.timeout_secs
            ))),
        }
    }

    async fn retrieve_inner(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        let embedding = self.provider.embed(query).await?;
        let entities = extract_entities(query);
        let graph_probe_runs = !entities.is_empty();

        let vector_fut = self
            .vector
            .search(tenant_id, &embedding, self.config.vector_top_k);
        let graph_fut = async {
            if graph_probe_runs {
                self.graph
                    .traverse(tenant_id, &entities, self.config.graph_max_hops)
                    .await
            } else {
                Ok(Vec::new())
            }
        };

        let (vector_res, graph_res) = tokio::join!(vector_fut, graph_fut);

        let (vector_results, graph_results) = match (vector_res, graph_res) {
            (Ok(v), Ok(g)) => (v, g),
            (Ok(v), Err(e)) => {
                warn!(tenant_id, error = %e, "graph probe failed, continuing with vector results");
                (v, Vec::new())
            }
            (Err(e), Ok(g)) if graph_probe_runs => {
                warn!(tenant_id, error = %e, "vector probe failed, continuing with graph results");
                (Vec::new(), g)
            }
            (Err(ve), Ok(_)) => {
                // Graph probe was skipped; the only live probe failed.
                return Err(MemoryError::ExternalService(format!(
                    "vector probe failed: {ve}"
                )));
            }
            (Err(ve), Err(ge)) => {
                return Err(MemoryError::ExternalService(format!(
                    "both probes failed: vector={ve}, graph={ge}"
                )));
            }
        };

        let merged = merge_results(vector_results, graph_results);
        info!(
            tenant_id,
            entities = entities.len(),
            merged = merged.len(),
            "retrieval completed"
        );
        Ok(merged)
    }
}

/// Vector results first (the semantic backbone), then graph facts,
/// deduplicated by result key.
fn merge_results(
    vector_results: Vec<RetrievalResult>,
    graph_results: Vec<RetrievalResult>,
) -> Vec<RetrievalResult> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(vector_results.len() + graph_results.len());

    for result in vector_results.into_iter().chain(graph_results) {
        if seen.insert(result.dedup_key()) {
            merged.push(result);
        }
    }
    merged
}

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '[', ']'];

/// Heuristic entity extraction: capitalized words and adjacent capitalized
/// bigrams. A placeholder for a proper extractor; non-Latin scripts bypass
/// the uppercase test.
pub fn extract_entities(query: &str) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let cleaned: Vec<&str> = words.iter().map(|w| w.trim_matches(TRIM_CHARS)).collect();
    let mut entities = Vec::new();

    let is_capitalized =
        |w: &str| w.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false);

    for w in &cleaned {
        if w.len() >= 2 && is_capitalized(w) {
            entities.push((*w).to_string());
        }
    }

    for pair in cleaned.windows(2) {
        if !pair[0].is_empty()
            && !pair[1].is_empty()
            && is_capitalized(pair[0])
            && is_capitalized(pair[1])
        {
            entities.push(format!("{} {}", pair[0], pair[1]));
        }
    }

    entities
}
