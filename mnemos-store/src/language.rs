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

//! Heuristic language model
//!
//! Deterministic, offline stand-in for a real LM provider: hashed bag-of-
//! words embeddings, a punctuation/length surprisal proxy, template
//! synthesis, and lenient triple extraction. Used by tests and by the
//! single-process mode; production binds an API-backed provider behind the
//! same trait. Surprisal from the proxy is not semantically equivalent to
//! model logprobs and is logged as such by the segmenter.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use mnemos_core::{
    Episode, LanguageModel, MemoryError, MemoryResult, TokenLogProb, Triple,
};

/// Deterministic [`LanguageModel`] requiring no network.
pub struct HeuristicLanguageModel {
    dimensions: usize,
    /// When false, `score_dig` reports the cross-encoder as unavailable so
    /// callers exercise their fallback path.
    dig_enabled: bool,
}

impl HeuristicLanguageModel {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            dig_enabled: false,
        }
    }

    pub fn with_dig_scoring(mut self) -> Self {
        self.dig_enabled = true;
        self
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let normalized = word
                .trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            normalized.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dimensions as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl LanguageModel for HeuristicLanguageModel {
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
    }

    async fn token_logprobs(&self, text: &str) -> MemoryResult<Vec<TokenLogProb>> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut probs = Vec::with_capacity(words.len());

        for (i, word) in words.iter().enumerate() {
            let mut logprob = -1.0;

            // Sentence starters are less predictable.
            if i > 0 {
                let prev = words[i - 1];
                if prev.ends_with('.') || prev.ends_with('!') || prev.ends_with('?') {
                    logprob = -4.0;
                }
            }
            if word.len() > 8 {
                logprob -= 1.5;
            }
            if word.contains('?') || word.contains('!') {
                logprob -= 2.0;
            }

            probs.push(TokenLogProb {
                token: (*word).to_string(),
                logprob,
            });
        }

        Ok(probs)
    }

    async fn score_dig(&self, query: &str, document: &str) -> MemoryResult<f64> {
        if !self.dig_enabled {
            return Err(MemoryError::ExternalService(
                "dig cross-encoder unavailable".into(),
            ));
        }
        // Token-overlap proxy for information gain.
        let doc_lower = document.to_lowercase();
        let query_words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        if query_words.is_empty() {
            return Ok(0.0);
        }
        let hits = query_words
            .iter()
            .filter(|w| doc_lower.contains(w.as_str()))
            .count();
        Ok(hits as f64 / query_words.len() as f64 - 0.1)
    }

    async fn synthesize(&self, episodes: &[Episode]) -> MemoryResult<String> {
        if episodes.is_empty() {
            return Err(MemoryError::Validation("empty cluster".into()));
        }
        let joined = episodes
            .iter()
            .map(|ep| ep.content.trim().trim_end_matches('.'))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(". ");
        Ok(format!("{joined}."))
    }

    async fn extract_triples(&self, text: &str) -> MemoryResult<Vec<Triple>> {
        let cleaned = strip_code_fences(text);

        // Strict JSON first, as a real provider would return.
        if let Ok(triples) = serde_json::from_str::<Vec<Triple>>(cleaned) {
            return Ok(triples);
        }

        // Lenient path: "subject predicate object" sentences.
        let mut triples = Vec::new();
        for sentence in cleaned.split(['.', ';']) {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            if let [subject, predicate, object] = words[..] {
                triples.push(Triple::new(subject, predicate, object, 0.8));
            }
        }
        Ok(triples)
    }

    async fn generate(&self, prompt: &str) -> MemoryResult<String> {
        Ok(prompt.trim().chars().take(256).collect())
    }

    fn count_tokens(&self, text: &str) -> usize {
        let count = text.len() / 4;
        if count == 0 && !text.is_empty() {
            1
        } else {
            count
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
