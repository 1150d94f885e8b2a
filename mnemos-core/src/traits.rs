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

//! Capability interfaces consumed by the memory core
//!
//! The vector store, graph store, language model, coordinator, and task
//! queue are external collaborators. Production binds concrete drivers once
//! at startup; tests bind the in-memory backends from `mnemos-store`.
//! The knowledge graph is cyclic by nature, so domain objects never hold
//! owning links to each other; everything crosses these boundaries by id.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::episode::Episode;
use crate::error::MemoryResult;
use crate::graph::{ConflictRecord, GraphRelationship, GraphStats, Triple};
use crate::retrieval::RetrievalResult;

/// Episodic vector store: the fast, append-heavy side of memory.
///
/// All reads are tenant-filtered; distance is cosine.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing collection if it does not exist.
    async fn ensure_collection(&self) -> MemoryResult<()>;

    /// Insert or update episodic fragments.
    async fn upsert(&self, episodes: &[Episode]) -> MemoryResult<()>;

    /// Top-K cosine search for a tenant.
    async fn search(
        &self,
        tenant_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> MemoryResult<Vec<RetrievalResult>>;

    /// Episodes still awaiting consolidation, oldest first.
    async fn get_unconsolidated(&self, tenant_id: &str, limit: usize)
        -> MemoryResult<Vec<Episode>>;

    /// Flip the given episodes to `consolidated`.
    async fn mark_consolidated(&self, ids: &[String]) -> MemoryResult<()>;

    /// Multiply the decay factor of the given episodes.
    async fn update_decay(&self, ids: &[String], factor: f64) -> MemoryResult<()>;

    async fn count_unconsolidated(&self, tenant_id: &str) -> MemoryResult<usize>;

    async fn delete(&self, ids: &[String]) -> MemoryResult<()>;
}

/// Semantic graph store: the slow, consolidation-written side of memory.
///
/// Only the consolidation pipeline calls the mutating methods.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create constraints / indexes if missing.
    async fn ensure_schema(&self) -> MemoryResult<()>;

    /// Insert a triple as a current relationship, upserting both endpoint
    /// entities by (tenant, name) and bumping their `last_accessed`.
    async fn insert_triple(
        &self,
        tenant_id: &str,
        triple: &Triple,
        source_episode_id: &str,
    ) -> MemoryResult<()>;

    /// Current relationships whose subject matches the given name.
    async fn query_by_subject(
        &self,
        tenant_id: &str,
        subject: &str,
    ) -> MemoryResult<Vec<GraphRelationship>>;

    /// Bounded traversal from the seed entities over current relationships.
    async fn traverse(
        &self,
        tenant_id: &str,
        seeds: &[String],
        max_hops: usize,
    ) -> MemoryResult<Vec<RetrievalResult>>;

    /// Current relationships with the same subject and predicate but a
    /// different object than the given triple.
    async fn find_conflicts(
        &self,
        tenant_id: &str,
        triple: &Triple,
    ) -> MemoryResult<Vec<ConflictRecord>>;

    /// Close the conflicting relationship's validity window and decay its
    /// confidence by `decay_rate`.
    async fn resolve_conflict(&self, conflict: &ConflictRecord, decay_rate: f64)
        -> MemoryResult<()>;

    async fn stats(&self, tenant_id: &str) -> MemoryResult<GraphStats>;
}

/// One token with its log probability under the provider's model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLogProb {
    pub token: String,
    pub logprob: f64,
}

/// Language model provider: embeddings, surprisal, scoring, and the
/// consolidation-time synthesis/extraction calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;

    /// Per-token log probabilities for the input. Providers without real
    /// logprob support serve a punctuation/length proxy instead.
    async fn token_logprobs(&self, text: &str) -> MemoryResult<Vec<TokenLogProb>>;

    /// Document Information Gain: log P(y|x,d) - log P(y|x).
    async fn score_dig(&self, query: &str, document: &str) -> MemoryResult<f64>;

    /// Distill a cluster of episodes into a one-sentence gist.
    async fn synthesize(&self, episodes: &[Episode]) -> MemoryResult<String>;

    /// Extract atomic triples from a gist. Strict JSON; code fences are the
    /// provider's problem to strip.
    async fn extract_triples(&self, text: &str) -> MemoryResult<Vec<Triple>>;

    async fn generate(&self, prompt: &str) -> MemoryResult<String>;

    /// Approximate token count; len/4 is acceptable.
    fn count_tokens(&self, text: &str) -> usize;
}

/// Key/value coordinator used for cross-process exclusion locks.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Atomic set-if-absent with TTL. Returns false if the key is held.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> MemoryResult<bool>;

    async fn delete(&self, key: &str) -> MemoryResult<()>;

    async fn ping(&self) -> MemoryResult<()>;
}

/// A unit of background work dispatched by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationTask {
    pub tenant_id: String,
}

/// Task queue feeding the consolidation worker pool.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: ConsolidationTask) -> MemoryResult<()>;
}

/// Handler invoked by the queue's workers, with retries and a per-task
/// deadline applied by the queue.
#[async_trait]
pub trait ConsolidationHandler: Send + Sync {
    async fn process(&self, tenant_id: &str) -> MemoryResult<()>;
}
