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

//! Wire types for the ingest and query surfaces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalResult;

/// Payload for ingesting new conversational memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub tenant_id: String,
    pub content: String,
    /// "user" or "assistant"
    pub role: String,
}

/// Metadata about the episodes produced by an ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub episode_ids: Vec<String>,
    pub segments: usize,
    pub message: String,
}

/// Payload for querying memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub tenant_id: String,
    pub query: String,
    /// Overrides the configured packing budget when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<usize>,
}

/// The assembled context and its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub context: String,
    pub sources: Vec<RetrievalResult>,
    pub tokens_used: usize,
    pub token_budget: usize,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub dig_scores: HashMap<String, f64>,
}
