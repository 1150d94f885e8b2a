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

//! Surprisal-based event segmentation
//!
//! Carves a stream of conversational text into episodic fragments at
//! information-theoretic event boundaries:
//!
//! ```text
//!   S(x_t) = -log P(x_t | x_<t)
//!   boundary when S > mu + gamma * sigma
//! ```
//!
//! where mu and sigma are rolling statistics over the last tau surprisal
//! samples, tracked per tenant so thresholds adapt to each conversation's
//! own volatility.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use mnemos_core::{
    config::SegmentationConfig, Episode, LanguageModel, MemoryResult, TokenLogProb,
};

/// Sliding window of surprisal samples with cached mean and deviation.
///
/// Updates happen inside a short critical section; the buffer is fixed-size
/// and wraps, so after tau samples only the most recent tau contribute.
pub struct RollingStats {
    values: Vec<f64>,
    idx: usize,
    full: bool,
    mu: f64,
    sigma: f64,
}

impl RollingStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: vec![0.0; window_size.max(1)],
            idx: 0,
            full: false,
            mu: 0.0,
            sigma: 0.0,
        }
    }

    /// Record a sample and recompute mu and sigma over the filled window.
    pub fn update(&mut self, sample: f64) {
        self.values[self.idx] = sample;
        self.idx = (self.idx + 1) % self.values.len();
        if self.idx == 0 {
            self.full = true;
        }

        let n = if self.full { self.values.len() } else { self.idx };
        if n == 0 {
            return;
        }

        let window = &self.values[..n];
        self.mu = window.iter().sum::<f64>() / n as f64;
        let variance = window.iter().map(|v| (v - self.mu).powi(2)).sum::<f64>() / n as f64;
        self.sigma = variance.sqrt();
    }

    pub fn mean(&self) -> f64 {
        self.mu
    }

    pub fn deviation(&self) -> f64 {
        self.sigma
    }

    /// Current boundary threshold: mu + gamma * sigma.
    pub fn threshold(&self, gamma: f64) -> f64 {
        self.mu + gamma * self.sigma
    }
}

/// Segments raw text into episodes at surprisal boundaries.
pub struct SurprisalSegmenter {
    provider: Arc<dyn LanguageModel>,
    config: SegmentationConfig,
    /// Per-tenant rolling statistics, hydrated lazily on first use.
    stats: DashMap<String, Arc<Mutex<RollingStats>>>,
}

impl SurprisalSegmenter {
    pub fn new(provider: Arc<dyn LanguageModel>, config: SegmentationConfig) -> Self {
        Self {
            provider,
            config,
            stats: DashMap::new(),
        }
    }

    fn tenant_stats(&self, tenant_id: &str) -> Arc<Mutex<RollingStats>> {
        self.stats
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RollingStats::new(self.config.window_size))))
            .clone()
    }

    /// Segment `text` into an ordered sequence of pending episodes.
    ///
    /// Boundary detection never fails; only embedding errors propagate.
    pub async fn segment(&self, tenant_id: &str, text: &str) -> MemoryResult<Vec<Episode>> {
        let stats = self.tenant_stats(tenant_id);

        let token_probs = match self.provider.token_logprobs(text).await {
            Ok(probs) => probs,
            Err(e) => {
                warn!(tenant_id, error = %e, "token logprobs unavailable, emitting single episode");
                return self.single_episode(tenant_id, text).await;
            }
        };
        if token_probs.is_empty() {
            return self.single_episode(tenant_id, text).await;
        }

        let event_id = Uuid::new_v4().to_string();
        let mut episodes = Vec::new();
        let mut accumulated: Vec<&str> = Vec::new();
        let mut total_surprisal = 0.0;
        let mut max_surprisal = 0.0f64;
        let mut token_count = 0usize;

        for TokenLogProb { token, logprob } in &token_probs {
            let surprisal = (-logprob).max(0.0);

            let threshold = {
                let mut guard = stats.lock();
                guard.update(surprisal);
                guard.threshold(self.config.gamma)
            };

            let mut is_boundary =
                surprisal > threshold && token_count >= self.config.min_episode_tokens;
            if token_count >= self.config.max_episode_tokens {
                is_boundary = true;
            }

            if is_boundary && !accumulated.is_empty() {
                let content = accumulated.join(" ");
                let avg = total_surprisal / token_count as f64;
                let ep = self
                    .create_episode(tenant_id, &content, avg.max(max_surprisal), &event_id)
                    .await?
                    .with_token_count(token_count);
                episodes.push(ep);

                accumulated.clear();
                total_surprisal = 0.0;
                max_surprisal = 0.0;
                token_count = 0;
            }

            accumulated.push(token.as_str());
            total_surprisal += surprisal;
            max_surprisal = max_surprisal.max(surprisal);
            token_count += 1;
        }

        if !accumulated.is_empty() {
            let content = accumulated.join(" ");
            let avg = if token_count > 0 {
                total_surprisal / token_count as f64
            } else {
                0.0
            };
            let ep = self
                .create_episode(tenant_id, &content, avg.max(max_surprisal), &event_id)
                .await?
                .with_token_count(token_count);
            episodes.push(ep);
        }

        debug!(
            tenant_id,
            tokens = token_probs.len(),
            segments = episodes.len(),
            "segmentation completed"
        );
        Ok(episodes)
    }

    async fn create_episode(
        &self,
        tenant_id: &str,
        content: &str,
        surprisal: f64,
        event_id: &str,
    ) -> MemoryResult<Episode> {
        let embedding = self.provider.embed(content).await?;
        Ok(Episode::new(tenant_id, content, embedding, surprisal).with_event(event_id))
    }

    /// Whole input as one episode; used when logprobs are unavailable.
    async fn single_episode(&self, tenant_id: &str, text: &str) -> MemoryResult<Vec<Episode>> {
        let event_id = Uuid::new_v4().to_string();
        let ep = self
            .create_episode(tenant_id, text, 1.0, &event_id)
            .await?
            .with_token_count(self.provider.count_tokens(text));
        Ok(vec![ep])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mnemos_core::{MemoryError, Triple};

    /// Provider with scripted logprobs: one per whitespace token.
    struct ScriptedModel {
        logprobs: Vec<f64>,
        fail_logprobs: bool,
    }

    impl ScriptedModel {
        fn new(logprobs: Vec<f64>) -> Self {
            Self {
                logprobs,
                fail_logprobs: false,
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn embed(&self, _text: &str) -> MemoryResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        async fn token_logprobs(&self, text: &str) -> MemoryResult<Vec<TokenLogProb>> {
            if self.fail_logprobs {
                return Err(MemoryError::ExternalService("no logprobs".into()));
            }
            Ok(text
                .split_whitespace()
                .zip(self.logprobs.iter())
                .map(|(token, lp)| TokenLogProb {
                    token: token.to_string(),
                    logprob: *lp,
                })
                .collect())
        }

        async fn score_dig(&self, _q: &str, _d: &str) -> MemoryResult<f64> {
            Ok(0.0)
        }

        async fn synthesize(&self, _eps: &[Episode]) -> MemoryResult<String> {
            Ok(String::new())
        }

        async fn extract_triples(&self, _text: &str) -> MemoryResult<Vec<Triple>> {
            Ok(vec![])
        }

        async fn generate(&self, prompt: &str) -> MemoryResult<String> {
            Ok(prompt.to_string())
        }

        fn count_tokens(&self, text: &str) -> usize {
            (text.len() / 4).max(1)
        }
    }

    fn config(window: usize, min_tokens: usize, max_tokens: usize) -> SegmentationConfig {
        SegmentationConfig {
            gamma: 1.5,
            window_size: window,
            min_episode_tokens: min_tokens,
            max_episode_tokens: max_tokens,
        }
    }

    #[test]
    fn rolling_mean_matches_arithmetic_mean_before_fill() {
        let mut stats = RollingStats::new(10);
        for v in [1.0, 2.0, 3.0] {
            stats.update(v);
        }
        assert!((stats.mean() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rolling_window_forgets_old_samples() {
        let mut stats = RollingStats::new(3);
        for v in [100.0, 100.0, 100.0, 1.0, 1.0, 1.0] {
            stats.update(v);
        }
        assert!((stats.mean() - 1.0).abs() < 1e-12);
        assert!(stats.deviation().abs() < 1e-12);
    }

    #[tokio::test]
    async fn single_turn_yields_one_pending_episode() {
        let provider = Arc::new(ScriptedModel::new(vec![-1.0, -1.0]));
        let seg = SurprisalSegmenter::new(provider, config(10, 5, 500));

        let episodes = seg.segment("u1", "Hello world").await.unwrap();
        assert_eq!(episodes.len(), 1);
        let ep = &episodes[0];
        assert_eq!(ep.content, "Hello world");
        assert_eq!(ep.surprisal_value, 1.0);
        assert_eq!(ep.token_count, 2);
        assert_eq!(ep.decay_factor, 1.0);
        assert_eq!(
            ep.consolidation_status,
            mnemos_core::ConsolidationStatus::Pending
        );
    }

    #[tokio::test]
    async fn surprisal_spike_creates_boundary() {
        // Ten calm tokens then a spike: threshold sits near 1, S = 9 fires.
        let mut logprobs = vec![-1.0; 10];
        logprobs.push(-9.0);
        let provider = Arc::new(ScriptedModel::new(logprobs));
        let seg = SurprisalSegmenter::new(provider, config(10, 5, 500));

        let text = "t0 t1 t2 t3 t4 t5 t6 t7 t8 t9 spike";
        let episodes = seg.segment("u1", text).await.unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].content, "t0 t1 t2 t3 t4 t5 t6 t7 t8 t9");
        assert_eq!(episodes[0].token_count, 10);
        assert_eq!(episodes[1].content, "spike");
        assert_eq!(episodes[1].surprisal_value, 9.0);
        assert_eq!(episodes[0].event_id, episodes[1].event_id);
    }

    #[tokio::test]
    async fn max_tokens_forces_boundary() {
        let provider = Arc::new(ScriptedModel::new(vec![-1.0; 8]));
        let seg = SurprisalSegmenter::new(provider, config(50, 1, 4));

        let episodes = seg.segment("u1", "a b c d e f g h").await.unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].token_count, 4);
        assert_eq!(episodes[1].token_count, 4);
    }

    #[tokio::test]
    async fn logprob_failure_falls_back_to_whole_input() {
        let provider = Arc::new(ScriptedModel {
            logprobs: vec![],
            fail_logprobs: true,
        });
        let seg = SurprisalSegmenter::new(provider, config(10, 5, 500));

        let episodes = seg.segment("u1", "some opaque text").await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].surprisal_value, 1.0);
        assert_eq!(episodes[0].content, "some opaque text");
    }

    #[tokio::test]
    async fn empty_logprobs_fall_back_to_whole_input() {
        let provider = Arc::new(ScriptedModel::new(vec![]));
        let seg = SurprisalSegmenter::new(provider, config(10, 5, 500));

        let episodes = seg.segment("u1", "").await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].surprisal_value, 1.0);
    }

    #[tokio::test]
    async fn tenants_have_independent_thresholds() {
        // u1 sees calm traffic first; u2's stats start cold.
        let provider = Arc::new(ScriptedModel::new(vec![-1.0; 6]));
        let seg = SurprisalSegmenter::new(provider, config(10, 1, 500));

        seg.segment("u1", "a b c d e f").await.unwrap();
        assert!(seg.stats.contains_key("u1"));
        assert!(!seg.stats.contains_key("u2"));

        seg.segment("u2", "a b c d e f").await.unwrap();
        assert!(seg.stats.contains_key("u2"));
    }
}
