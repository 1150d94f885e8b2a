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

//! Document Information Gain reranking
//!
//! ```text
//!   DIG(d|x) = log P(y|x,d) - log P(y|x)
//! ```
//!
//! Positive gain means the document helps answer the query; non-positive
//! candidates are distractors and are filtered out. When the LM
//! cross-encoder is unavailable, a heuristic blend of cosine score,
//! recency, surprisal, and importance stands in.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use mnemos_core::{config::DigConfig, DigCandidate, LanguageModel, MemoryResult, RetrievalResult};

/// Reranks retrieval candidates by information gain.
pub struct Reranker {
    provider: Arc<dyn LanguageModel>,
    config: DigConfig,
}

impl Reranker {
    pub fn new(provider: Arc<dyn LanguageModel>, config: DigConfig) -> Self {
        Self { provider, config }
    }

    /// Score, filter (score > min_score), and sort candidates descending.
    /// Ties keep input order; per-candidate scoring failures drop only that
    /// candidate when the fallback is disabled.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalResult>,
    ) -> MemoryResult<Vec<DigCandidate>> {
        let mut scored = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let content = candidate.content();
            if content.is_empty() {
                continue;
            }

            let dig_score = match self.provider.score_dig(query, &content).await {
                Ok(score) => score,
                Err(e) => {
                    if !self.config.fallback_enabled {
                        debug!(error = %e, "dig scoring failed, candidate dropped");
                        continue;
                    }
                    heuristic_score(&candidate)
                }
            };

            scored.push(DigCandidate {
                result: candidate,
                dig_score,
                content,
            });
        }

        scored.retain(|c| c.dig_score > self.config.min_score);
        // Stable: equal scores keep retrieval order.
        scored.sort_by(|a, b| {
            b.dig_score
                .partial_cmp(&a.dig_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(scored)
    }
}

/// Heuristic information-gain proxy: cosine baseline plus recency,
/// surprisal salience, and importance, damped by the decay factor. Graph
/// facts contribute their confidence.
pub fn heuristic_score(result: &RetrievalResult) -> f64 {
    let mut score = result.score;

    if let Some(ep) = &result.episode {
        let age_hours = (Utc::now() - ep.timestamp).num_seconds() as f64 / 3600.0;
        score += 0.3 * (-age_hours / 24.0).exp();

        if ep.surprisal_value > 0.0 {
            score += 0.2 * ep.surprisal_value.ln_1p() / 5.0;
        }

        score += 0.1 * ep.importance_score;
        score *= ep.decay_factor;
    }

    for fact in &result.graph_facts {
        score += 0.15 * fact.confidence;
    }

    score
}
