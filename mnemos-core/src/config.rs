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

//! Memory system configuration
//!
//! One section per subsystem. Every field has a serde default so a partial
//! TOML file (or an empty one) yields a fully working configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the memory substrate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MnemosConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub dig: DigConfig,
    #[serde(default)]
    pub knapsack: KnapsackConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
}

/// Embedding dimensionality shared by all stores and providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_dimensions() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
        }
    }
}

/// Surprisal segmentation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Boundary sensitivity gamma in S > mu + gamma * sigma
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Rolling statistics window tau
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Minimum tokens accumulated before a boundary may fire
    #[serde(default = "default_min_episode_tokens")]
    pub min_episode_tokens: usize,
    /// Hard cap forcing a boundary
    #[serde(default = "default_max_episode_tokens")]
    pub max_episode_tokens: usize,
}

fn default_gamma() -> f64 {
    1.5
}
fn default_window_size() -> usize {
    50
}
fn default_min_episode_tokens() -> usize {
    5
}
fn default_max_episode_tokens() -> usize {
    500
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            window_size: default_window_size(),
            min_episode_tokens: default_min_episode_tokens(),
            max_episode_tokens: default_max_episode_tokens(),
        }
    }
}

/// Hybrid retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_vector_top_k")]
    pub vector_top_k: usize,
    #[serde(default = "default_graph_max_hops")]
    pub graph_max_hops: usize,
    /// Per-request deadline in seconds
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vector_top_k() -> usize {
    20
}
fn default_graph_max_hops() -> usize {
    2
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: default_vector_top_k(),
            graph_max_hops: default_graph_max_hops(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

/// DIG reranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigConfig {
    /// Candidates scoring at or below this are dropped as distractors
    #[serde(default)]
    pub min_score: f64,
    /// Use the heuristic score when the LM cross-encoder is unavailable
    #[serde(default = "default_fallback_enabled")]
    pub fallback_enabled: bool,
}

fn default_fallback_enabled() -> bool {
    true
}

impl Default for DigConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            fallback_enabled: default_fallback_enabled(),
        }
    }
}

/// Context window packing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnapsackConfig {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Last K conversation turns are always included
    #[serde(default = "default_force_recent_turns")]
    pub force_recent_turns: usize,
}

fn default_token_budget() -> usize {
    4096
}
fn default_force_recent_turns() -> usize {
    3
}

impl Default for KnapsackConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            force_recent_turns: default_force_recent_turns(),
        }
    }
}

/// Consolidation pipeline and scheduler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Trigger: tenant idle longer than this
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Trigger: at least this many pending episodes
    #[serde(default = "default_max_unconsolidated")]
    pub max_unconsolidated: usize,
    #[serde(default = "default_dbscan_epsilon")]
    pub dbscan_epsilon: f64,
    #[serde(default = "default_dbscan_min_points")]
    pub dbscan_min_points: usize,
    /// Confidence multiplier applied when a fact is superseded
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Episodes fetched per consolidation run
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// Scheduler tick
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Exclusion lock TTL and per-task deadline
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_task_retries")]
    pub task_retries: usize,
}

fn default_inactivity_timeout_secs() -> u64 {
    15 * 60
}
fn default_max_unconsolidated() -> usize {
    10
}
fn default_dbscan_epsilon() -> f64 {
    0.3
}
fn default_dbscan_min_points() -> usize {
    3
}
fn default_decay_rate() -> f64 {
    0.95
}
fn default_batch_limit() -> usize {
    100
}
fn default_worker_concurrency() -> usize {
    5
}
fn default_check_interval_secs() -> u64 {
    60
}
fn default_lock_ttl_secs() -> u64 {
    5 * 60
}
fn default_task_retries() -> usize {
    3
}

impl ConsolidationConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            max_unconsolidated: default_max_unconsolidated(),
            dbscan_epsilon: default_dbscan_epsilon(),
            dbscan_min_points: default_dbscan_min_points(),
            decay_rate: default_decay_rate(),
            batch_limit: default_batch_limit(),
            worker_concurrency: default_worker_concurrency(),
            check_interval_secs: default_check_interval_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            task_retries: default_task_retries(),
        }
    }
}
