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

//! Retrieval and packing types shared by the query read path.

use serde::{Deserialize, Serialize};

use crate::episode::Episode;
use crate::graph::Triple;

/// Which probe produced a retrieval result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Vector,
    Graph,
}

/// A memory fragment with its retrieval metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<Episode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graph_facts: Vec<Triple>,
    /// Cosine similarity (vector) or edge confidence (graph)
    pub score: f64,
    pub source: RetrievalSource,
}

impl RetrievalResult {
    pub fn from_episode(episode: Episode, score: f64) -> Self {
        Self {
            episode: Some(episode),
            graph_facts: Vec::new(),
            score,
            source: RetrievalSource::Vector,
        }
    }

    pub fn from_facts(facts: Vec<Triple>, score: f64) -> Self {
        Self {
            episode: None,
            graph_facts: facts,
            score,
            source: RetrievalSource::Graph,
        }
    }

    /// Textual content of the result: episode text, or the facts rendered
    /// as sentences for graph-only results.
    pub fn content(&self) -> String {
        if let Some(ep) = &self.episode {
            if !ep.content.is_empty() {
                return ep.content.clone();
            }
        }
        self.graph_facts
            .iter()
            .map(|f| format!("{f}. "))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    /// Deduplication key: `ep:<id>` for episode-bearing results,
    /// `gf:<subj:pred:obj|...>` for graph-only results.
    pub fn dedup_key(&self) -> String {
        if let Some(ep) = &self.episode {
            return format!("ep:{}", ep.id);
        }
        let mut key = String::from("gf:");
        for f in &self.graph_facts {
            key.push_str(&f.subject);
            key.push(':');
            key.push_str(&f.predicate);
            key.push(':');
            key.push_str(&f.object);
            key.push('|');
        }
        key
    }
}

/// A retrieval result annotated with its Document Information Gain score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigCandidate {
    pub result: RetrievalResult,
    pub dig_score: f64,
    pub content: String,
}

/// A candidate for context window packing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnapsackItem {
    pub id: String,
    pub content: String,
    /// DIG score, or 1000 for force-included turns
    pub value: f64,
    /// Token count (> 0)
    pub weight: usize,
    /// Recent turns bypass the density threshold
    #[serde(default)]
    pub force_include: bool,
    /// value / weight
    #[serde(default)]
    pub density: f64,
}

impl KnapsackItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>, value: f64, weight: usize) -> Self {
        let weight = weight.max(1);
        Self {
            id: id.into(),
            content: content.into(),
            value,
            weight,
            force_include: false,
            density: value / weight as f64,
        }
    }
}
