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

//! Semantic memory types
//!
//! The semantic store holds (subject, predicate, object) facts as directed
//! edges between named entities with bi-temporal validity: `valid_from` /
//! `valid_to` track when the fact holds in the world, `transaction_time`
//! tracks when the system recorded it. Only the consolidation pipeline
//! creates or mutates relationships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::Episode;

/// An atomic semantic fact extracted during consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// In [0, 1]
    pub confidence: f64,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A named node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// A directed edge between two named entities, bi-temporally versioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: String,
    pub tenant_id: String,
    pub from_entity: String,
    pub to_entity: String,
    /// The triple's predicate
    pub relation_type: String,
    pub confidence: f64,
    /// When the fact became true in the world
    pub valid_from: DateTime<Utc>,
    /// None = currently valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    /// When the system recorded the fact
    pub transaction_time: DateTime<Utc>,
    /// Provenance back to the originating episode
    pub source_episode_id: String,
    pub decay_rate: f64,
}

impl GraphRelationship {
    /// A relationship is current iff its validity window is still open.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        match self.valid_to {
            None => true,
            Some(until) => until > now,
        }
    }

    /// View the edge as a triple.
    pub fn as_triple(&self) -> Triple {
        Triple {
            subject: self.from_entity.clone(),
            predicate: self.relation_type.clone(),
            object: self.to_entity.clone(),
            confidence: self.confidence,
        }
    }
}

/// A collision between an incoming triple and an existing current fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub existing_rel_id: String,
    pub existing_triple: Triple,
    pub new_triple: Triple,
    pub detected_at: DateTime<Utc>,
    /// "update", "discard", or "coexist"
    pub resolution: String,
}

/// A group of semantically related episodes found by clustering.
///
/// Transient: produced and consumed inside one consolidation run,
/// never persisted.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Positive for density clusters, negative for singleton noise points
    pub id: i64,
    pub episodes: Vec<Episode>,
    /// Componentwise mean of member embeddings
    pub centroid: Vec<f32>,
}

/// Aggregate counts reported by the semantic store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    pub current_relationship_count: usize,
}
