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

//! In-memory episodic vector store
//!
//! Linear cosine scan over a tenant-filtered map. The reference backend for
//! tests and single-process mode; production binds an external vector
//! database behind the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use mnemos_core::{
    ConsolidationStatus, Episode, MemoryError, MemoryResult, RetrievalResult, VectorStore,
};

/// Cosine similarity; zero-norm inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..a.len() {
        dot += a[i] as f64 * b[i] as f64;
        norm_a += a[i] as f64 * a[i] as f64;
        norm_b += b[i] as f64 * b[i] as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// In-memory [`VectorStore`].
pub struct MemoryVectorStore {
    dimensions: usize,
    episodes: RwLock<HashMap<String, Episode>>,
}

impl MemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            episodes: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch one episode by id (test convenience).
    pub async fn get(&self, id: &str) -> Option<Episode> {
        self.episodes.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.episodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.episodes.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self) -> MemoryResult<()> {
        Ok(())
    }

    async fn upsert(&self, episodes: &[Episode]) -> MemoryResult<()> {
        for ep in episodes {
            if ep.embedding.len() != self.dimensions {
                return Err(MemoryError::Validation(format!(
                    "embedding dimension {} != {} for episode {}",
                    ep.embedding.len(),
                    self.dimensions,
                    ep.id
                )));
            }
        }
        let mut map = self.episodes.write().await;
        for ep in episodes {
            map.insert(ep.id.clone(), ep.clone());
        }
        debug!(count = episodes.len(), "episodes upserted");
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        query: &[f32],
        top_k: usize,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        let map = self.episodes.read().await;
        let mut scored: Vec<(f64, &Episode)> = map
            .values()
            .filter(|ep| ep.tenant_id == tenant_id)
            .map(|ep| (cosine_similarity(query, &ep.embedding), ep))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, ep)| RetrievalResult::from_episode(ep.clone(), score))
            .collect())
    }

    async fn get_unconsolidated(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> MemoryResult<Vec<Episode>> {
        let map = self.episodes.read().await;
        let mut pending: Vec<Episode> = map
            .values()
            .filter(|ep| {
                ep.tenant_id == tenant_id
                    && ep.consolidation_status == ConsolidationStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|ep| ep.timestamp);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_consolidated(&self, ids: &[String]) -> MemoryResult<()> {
        let mut map = self.episodes.write().await;
        for id in ids {
            if let Some(ep) = map.get_mut(id) {
                ep.consolidation_status = ConsolidationStatus::Consolidated;
            }
        }
        Ok(())
    }

    async fn update_decay(&self, ids: &[String], factor: f64) -> MemoryResult<()> {
        let mut map = self.episodes.write().await;
        for id in ids {
            if let Some(ep) = map.get_mut(id) {
                ep.decay_factor = (ep.decay_factor * factor).clamp(f64::MIN_POSITIVE, 1.0);
            }
        }
        Ok(())
    }

    async fn count_unconsolidated(&self, tenant_id: &str) -> MemoryResult<usize> {
        let map = self.episodes.read().await;
        Ok(map
            .values()
            .filter(|ep| {
                ep.tenant_id == tenant_id
                    && ep.consolidation_status == ConsolidationStatus::Pending
            })
            .count())
    }

    async fn delete(&self, ids: &[String]) -> MemoryResult<()> {
        let mut map = self.episodes.write().await;
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(tenant: &str, content: &str, embedding: Vec<f32>) -> Episode {
        Episode::new(tenant, content, embedding, 1.0)
    }

    #[tokio::test]
    async fn search_is_tenant_filtered_and_ranked() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(&[
                episode("u1", "close", vec![1.0, 0.0]),
                episode("u1", "far", vec![0.0, 1.0]),
                episode("u2", "other tenant", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search("u1", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].episode.as_ref().unwrap().content, "close");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = MemoryVectorStore::new(3);
        let err = store
            .upsert(&[episode("u1", "bad", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[tokio::test]
    async fn consolidation_lifecycle() {
        let store = MemoryVectorStore::new(1);
        let eps = vec![
            episode("u1", "a", vec![1.0]),
            episode("u1", "b", vec![1.0]),
        ];
        let ids: Vec<String> = eps.iter().map(|e| e.id.clone()).collect();
        store.upsert(&eps).await.unwrap();

        assert_eq!(store.count_unconsolidated("u1").await.unwrap(), 2);

        store.mark_consolidated(&ids[..1]).await.unwrap();
        assert_eq!(store.count_unconsolidated("u1").await.unwrap(), 1);

        store.update_decay(&ids[..1], 0.95).await.unwrap();
        let ep = store.get(&ids[0]).await.unwrap();
        assert!((ep.decay_factor - 0.95).abs() < 1e-9);
        assert_eq!(ep.consolidation_status, ConsolidationStatus::Consolidated);

        let pending = store.get_unconsolidated("u1", 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "b");
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
    }
}
