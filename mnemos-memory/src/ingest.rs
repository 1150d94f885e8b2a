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

//! Ingest pipeline: the episodic write path
//!
//! Raw input is segmented at surprisal boundaries, stamped with request
//! metadata, and committed append-only to the vector store. Nothing here
//! touches the semantic store; graph writes are reserved for the
//! consolidation cycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use mnemos_core::{IngestResponse, MemoryError, MemoryResult, VectorStore};

use crate::segmentation::SurprisalSegmenter;

/// Segment-and-store front of the memory system.
pub struct IngestService {
    segmenter: Arc<SurprisalSegmenter>,
    vector: Arc<dyn VectorStore>,
}

impl IngestService {
    pub fn new(segmenter: Arc<SurprisalSegmenter>, vector: Arc<dyn VectorStore>) -> Self {
        Self { segmenter, vector }
    }

    /// Ingest one turn of conversation for a tenant.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        content: &str,
        role: &str,
    ) -> MemoryResult<IngestResponse> {
        if tenant_id.is_empty() {
            return Err(MemoryError::Validation("tenant_id is required".into()));
        }
        if content.is_empty() {
            return Err(MemoryError::Validation("content is required".into()));
        }
        if role != "user" && role != "assistant" {
            return Err(MemoryError::Validation(format!(
                "role must be user or assistant, got {role:?}"
            )));
        }

        let mut episodes = self.segmenter.segment(tenant_id, content).await?;
        if episodes.is_empty() {
            return Ok(IngestResponse {
                episode_ids: Vec::new(),
                segments: 0,
                message: "no episodes generated".into(),
            });
        }

        let ingested_at = Utc::now().to_rfc3339();
        for ep in &mut episodes {
            ep.metadata
                .insert("role".into(), serde_json::Value::String(role.into()));
            ep.metadata.insert(
                "ingested_at".into(),
                serde_json::Value::String(ingested_at.clone()),
            );
        }

        self.vector.upsert(&episodes).await?;

        let episode_ids: Vec<String> = episodes.iter().map(|ep| ep.id.clone()).collect();
        info!(
            tenant_id,
            segments = episodes.len(),
            content_length = content.len(),
            "ingest completed"
        );

        Ok(IngestResponse {
            segments: episode_ids.len(),
            message: format!("ingested {} episodic fragments", episode_ids.len()),
            episode_ids,
        })
    }
}
