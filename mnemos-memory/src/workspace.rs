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

//! Cognitive workspace: the query read path
//!
//! Orchestrates retrieve -> rerank -> pack -> assemble and keeps the
//! per-tenant conversation buffer (the last turns of raw dialogue, bounded
//! drop-oldest). The packed context interleaves recent turns with the
//! highest-gain memories under the token budget.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use mnemos_core::{
    config::KnapsackConfig, ConversationTurn, KnapsackItem, MemoryResult, QueryRequest,
    QueryResponse,
};

use crate::dig::Reranker;
use crate::knapsack::Optimizer;
use crate::retrieval::Retriever;

/// Turns kept per tenant before dropping the oldest.
const MAX_TURNS: usize = 100;

/// Working-memory buffer and read-path orchestrator.
pub struct Workspace {
    retriever: Retriever,
    reranker: Reranker,
    optimizer: Optimizer,
    /// Per-tenant conversation history
    history: DashMap<String, Vec<ConversationTurn>>,
}

impl Workspace {
    pub fn new(retriever: Retriever, reranker: Reranker, config: KnapsackConfig) -> Self {
        Self {
            retriever,
            reranker,
            optimizer: Optimizer::new(config),
            history: DashMap::new(),
        }
    }

    /// Append a turn to the tenant's conversation buffer.
    pub fn add_turn(&self, tenant_id: &str, role: &str, content: &str) {
        let mut turns = self.history.entry(tenant_id.to_string()).or_default();
        turns.push(ConversationTurn::new(role, content));
        if turns.len() > MAX_TURNS {
            let excess = turns.len() - MAX_TURNS;
            turns.drain(..excess);
        }
    }

    /// Snapshot of a tenant's buffered turns.
    pub fn recent_turns(&self, tenant_id: &str) -> Vec<ConversationTurn> {
        self.history
            .get(tenant_id)
            .map(|turns| turns.clone())
            .unwrap_or_default()
    }

    /// Execute the full read path and return assembled context.
    pub async fn query(&self, request: &QueryRequest) -> MemoryResult<QueryResponse> {
        let token_budget = request
            .token_budget
            .filter(|&b| b > 0)
            .unwrap_or_else(|| self.optimizer.token_budget());

        let results = self
            .retriever
            .retrieve(&request.tenant_id, &request.query)
            .await?;
        let candidate_count = results.len();

        let ranked = self.reranker.rerank(&request.query, results).await?;

        let mut dig_scores = HashMap::new();
        let mut items = Vec::with_capacity(ranked.len());
        for candidate in &ranked {
            let id = candidate
                .result
                .episode
                .as_ref()
                .map(|ep| ep.id.clone())
                .unwrap_or_default();
            let weight = (candidate.content.len() / 4).max(1);
            items.push(KnapsackItem::new(
                id.clone(),
                candidate.content.clone(),
                candidate.dig_score,
                weight,
            ));
            if !id.is_empty() {
                dig_scores.insert(id, candidate.dig_score);
            }
        }

        let turns = self.recent_turns(&request.tenant_id);
        let selection = self.optimizer.optimize(items, &turns, Some(token_budget));

        let context = assemble_context(&selection.selected, &request.query);
        let sources = ranked.into_iter().map(|c| c.result).collect();

        info!(
            tenant_id = %request.tenant_id,
            candidates = candidate_count,
            selected = selection.selected.len(),
            tokens_used = selection.total_tokens,
            utilization = selection.utilization,
            "workspace query completed"
        );

        Ok(QueryResponse {
            context,
            sources,
            tokens_used: selection.total_tokens,
            token_budget,
            dig_scores,
        })
    }
}

/// Render the packed selection into the final context string.
fn assemble_context(items: &[KnapsackItem], query: &str) -> String {
    let mut out = String::new();

    let turns: Vec<&KnapsackItem> = items.iter().filter(|i| i.force_include).collect();
    if !turns.is_empty() {
        out.push_str("## Recent Conversation\n");
        for item in turns {
            out.push_str(&item.content);
            out.push('\n');
        }
        out.push('\n');
    }

    let memories: Vec<&KnapsackItem> = items.iter().filter(|i| !i.force_include).collect();
    if !memories.is_empty() {
        out.push_str("## Retrieved Memories\n");
        for (i, item) in memories.iter().enumerate() {
            let _ = writeln!(out, "[Memory {}] {}", i + 1, item.content);
        }
        out.push('\n');
    }

    out.push_str("## Current Query\n");
    out.push_str(query);
    out
}
