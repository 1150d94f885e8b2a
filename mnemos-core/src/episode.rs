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

//! Episodic memory types
//!
//! An [`Episode`] is the atomic unit of episodic memory: a fragment of
//! conversation carved out by the surprisal segmenter, carrying its
//! embedding and consolidation lifecycle state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consolidation lifecycle state of an episodic fragment.
///
/// A `Consolidated` episode never returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    /// Freshly ingested, awaiting the next consolidation run
    Pending,
    /// Distilled into the semantic store
    Consolidated,
    /// Retired from active retrieval
    Archived,
}

/// Distinguishes episodic fragments from semantic abstractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Episodic,
    Semantic,
}

/// A segmented episodic memory fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Stable identifier
    pub id: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Textual content
    pub content: String,
    /// Dense embedding (length = configured dimensionality)
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Wall-clock time the fragment was created
    pub timestamp: DateTime<Utc>,
    /// Shared by all episodes emitted from the same input
    pub event_id: String,
    pub memory_kind: MemoryKind,
    /// Initially equal to the surprisal value
    pub importance_score: f64,
    pub consolidation_status: ConsolidationStatus,
    /// Surprisal computed at segmentation time (>= 0)
    pub surprisal_value: f64,
    #[serde(default)]
    pub associated_entities: Vec<String>,
    /// In (0, 1]; multiplied down by the forgetting step
    pub decay_factor: f64,
    #[serde(default)]
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Episode {
    /// Create a fresh pending episode with sensible defaults.
    pub fn new(
        tenant_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        surprisal: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            content: content.into(),
            embedding,
            timestamp: Utc::now(),
            event_id: Uuid::new_v4().to_string(),
            memory_kind: MemoryKind::Episodic,
            importance_score: surprisal,
            consolidation_status: ConsolidationStatus::Pending,
            surprisal_value: surprisal,
            associated_entities: Vec::new(),
            decay_factor: 1.0,
            token_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// Set the event group shared by sibling episodes from one input.
    pub fn with_event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    /// Set the token count measured at segmentation time.
    pub fn with_token_count(mut self, count: usize) -> Self {
        self.token_count = count;
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A single user/assistant exchange in the conversation buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_episode_defaults() {
        let ep = Episode::new("u1", "hello", vec![0.1, 0.2], 2.5);

        assert_eq!(ep.tenant_id, "u1");
        assert_eq!(ep.consolidation_status, ConsolidationStatus::Pending);
        assert_eq!(ep.memory_kind, MemoryKind::Episodic);
        assert_eq!(ep.decay_factor, 1.0);
        assert_eq!(ep.surprisal_value, 2.5);
        assert_eq!(ep.importance_score, 2.5);
        assert!(ep.associated_entities.is_empty());
        assert_ne!(ep.id, ep.event_id);
    }

    #[test]
    fn episode_serde_round_trip() {
        let ep = Episode::new("u1", "hello", vec![1.0], 0.0)
            .with_token_count(3)
            .with_metadata("role", serde_json::json!("user"));

        let json = serde_json::to_string(&ep).unwrap();
        let back: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.token_count, 3);
        assert_eq!(back.metadata["role"], serde_json::json!("user"));
        assert_eq!(back.consolidation_status, ConsolidationStatus::Pending);
    }
}
