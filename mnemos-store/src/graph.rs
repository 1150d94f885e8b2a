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

//! In-memory semantic graph store
//!
//! Entities are keyed by (tenant, name); relationships live in a flat map
//! and are versioned bi-temporally. Traversal and conflict queries only see
//! *current* relationships (open validity window). Entities reference each
//! other by name, never by owning pointers; the graph's cycles stay in the
//! maps.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use mnemos_core::{
    ConflictRecord, GraphEntity, GraphRelationship, GraphStats, GraphStore, MemoryError,
    MemoryResult, RetrievalResult, Triple,
};

/// Traversal result cap, matching the bounded reads of production backends.
const TRAVERSE_LIMIT: usize = 50;

/// In-memory [`GraphStore`].
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: RwLock<GraphInner>,
}

#[derive(Default)]
struct GraphInner {
    /// (tenant_id, entity name) -> entity
    entities: HashMap<(String, String), GraphEntity>,
    /// relationship id -> relationship
    relationships: HashMap<String, GraphRelationship>,
}

impl GraphInner {
    fn ensure_entity(&mut self, tenant_id: &str, name: &str) {
        let now = Utc::now();
        let key = (tenant_id.to_string(), name.to_string());
        self.entities
            .entry(key)
            .and_modify(|e| e.last_accessed = now)
            .or_insert_with(|| GraphEntity {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                created_at: now,
                last_accessed: now,
            });
    }

    fn current_for_tenant<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> impl Iterator<Item = &'a GraphRelationship> {
        let now = Utc::now();
        self.relationships
            .values()
            .filter(move |r| r.tenant_id == tenant_id && r.is_current(now))
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All relationships (historic included) for a tenant, test convenience.
    pub async fn all_relationships(&self, tenant_id: &str) -> Vec<GraphRelationship> {
        self.inner
            .read()
            .await
            .relationships
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn ensure_schema(&self) -> MemoryResult<()> {
        Ok(())
    }

    async fn insert_triple(
        &self,
        tenant_id: &str,
        triple: &Triple,
        source_episode_id: &str,
    ) -> MemoryResult<()> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        inner.ensure_entity(tenant_id, &triple.subject);
        inner.ensure_entity(tenant_id, &triple.object);

        // Re-extracted facts refresh the existing current edge instead of
        // inserting a duplicate current (s, p, o) version.
        let existing = inner
            .relationships
            .values_mut()
            .find(|r| {
                r.tenant_id == tenant_id
                    && r.from_entity == triple.subject
                    && r.relation_type == triple.predicate
                    && r.to_entity == triple.object
                    && r.is_current(now)
            });
        if let Some(rel) = existing {
            rel.confidence = triple.confidence;
            rel.transaction_time = now;
            debug!(rel_id = %rel.id, "current relationship refreshed");
            return Ok(());
        }

        let rel = GraphRelationship {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            from_entity: triple.subject.clone(),
            to_entity: triple.object.clone(),
            relation_type: triple.predicate.clone(),
            confidence: triple.confidence,
            valid_from: now,
            valid_to: None,
            transaction_time: now,
            source_episode_id: source_episode_id.to_string(),
            decay_rate: 1.0,
        };
        inner.relationships.insert(rel.id.clone(), rel);
        Ok(())
    }

    async fn query_by_subject(
        &self,
        tenant_id: &str,
        subject: &str,
    ) -> MemoryResult<Vec<GraphRelationship>> {
        let inner = self.inner.read().await;
        let mut rels: Vec<GraphRelationship> = inner
            .current_for_tenant(tenant_id)
            .filter(|r| r.from_entity == subject)
            .cloned()
            .collect();
        rels.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rels)
    }

    async fn traverse(
        &self,
        tenant_id: &str,
        seeds: &[String],
        max_hops: usize,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        let inner = self.inner.read().await;

        // Undirected adjacency over current edges only.
        let current: Vec<&GraphRelationship> = inner.current_for_tenant(tenant_id).collect();
        let mut adjacency: HashMap<&str, Vec<&GraphRelationship>> = HashMap::new();
        for &rel in &current {
            adjacency.entry(rel.from_entity.as_str()).or_default().push(rel);
            adjacency.entry(rel.to_entity.as_str()).or_default().push(rel);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut collected: HashMap<&str, &GraphRelationship> = HashMap::new();
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::new();

        for seed in seeds {
            if visited.insert(seed.as_str()) {
                frontier.push_back((seed.as_str(), 0));
            }
        }

        while let Some((name, depth)) = frontier.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for &rel in adjacency.get(name).into_iter().flatten() {
                collected.entry(rel.id.as_str()).or_insert(rel);
                let next = if rel.from_entity == name {
                    rel.to_entity.as_str()
                } else {
                    rel.from_entity.as_str()
                };
                if visited.insert(next) {
                    frontier.push_back((next, depth + 1));
                }
            }
        }

        let mut rels: Vec<&GraphRelationship> = collected.into_values().collect();
        rels.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rels.truncate(TRAVERSE_LIMIT);

        Ok(rels
            .into_iter()
            .map(|r| RetrievalResult::from_facts(vec![r.as_triple()], r.confidence))
            .collect())
    }

    async fn find_conflicts(
        &self,
        tenant_id: &str,
        triple: &Triple,
    ) -> MemoryResult<Vec<ConflictRecord>> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        Ok(inner
            .current_for_tenant(tenant_id)
            .filter(|r| {
                r.from_entity == triple.subject
                    && r.relation_type == triple.predicate
                    && r.to_entity != triple.object
            })
            .map(|r| ConflictRecord {
                existing_rel_id: r.id.clone(),
                existing_triple: r.as_triple(),
                new_triple: triple.clone(),
                detected_at: now,
                resolution: String::new(),
            })
            .collect())
    }

    async fn resolve_conflict(
        &self,
        conflict: &ConflictRecord,
        decay_rate: f64,
    ) -> MemoryResult<()> {
        let mut inner = self.inner.write().await;
        let rel = inner
            .relationships
            .get_mut(&conflict.existing_rel_id)
            .ok_or_else(|| {
                MemoryError::NotFound(format!("relationship {}", conflict.existing_rel_id))
            })?;

        rel.valid_to = Some(Utc::now());
        rel.confidence *= decay_rate;
        rel.decay_rate = decay_rate;
        debug!(rel_id = %rel.id, confidence = rel.confidence, "validity window closed");
        Ok(())
    }

    async fn stats(&self, tenant_id: &str) -> MemoryResult<GraphStats> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        let relationship_count = inner
            .relationships
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .count();
        let current_relationship_count = inner
            .relationships
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.is_current(now))
            .count();
        let entity_count = inner
            .entities
            .keys()
            .filter(|(tenant, _)| tenant == tenant_id)
            .count();
        Ok(GraphStats {
            entity_count,
            relationship_count,
            current_relationship_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_upserts_entities_and_edges() {
        let store = MemoryGraphStore::new();
        let triple = Triple::new("alice", "lives_in", "paris", 0.9);
        store.insert_triple("u1", &triple, "ep1").await.unwrap();
        store.insert_triple("u1", &triple, "ep2").await.unwrap();

        // Identical current triple refreshed, not duplicated.
        let stats = store.stats("u1").await.unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.relationship_count, 1);
        assert_eq!(stats.current_relationship_count, 1);

        let rels = store.query_by_subject("u1", "alice").await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_episode_id, "ep1");
    }

    #[tokio::test]
    async fn conflicts_only_match_different_objects() {
        let store = MemoryGraphStore::new();
        store
            .insert_triple("u1", &Triple::new("alice", "lives_in", "paris", 0.9), "ep1")
            .await
            .unwrap();

        let same = store
            .find_conflicts("u1", &Triple::new("alice", "lives_in", "paris", 0.95))
            .await
            .unwrap();
        assert!(same.is_empty());

        let different = store
            .find_conflicts("u1", &Triple::new("alice", "lives_in", "berlin", 0.95))
            .await
            .unwrap();
        assert_eq!(different.len(), 1);
        assert_eq!(different[0].existing_triple.object, "paris");

        let other_tenant = store
            .find_conflicts("u2", &Triple::new("alice", "lives_in", "berlin", 0.95))
            .await
            .unwrap();
        assert!(other_tenant.is_empty());
    }

    #[tokio::test]
    async fn resolve_closes_window_and_decays() {
        let store = MemoryGraphStore::new();
        store
            .insert_triple("u1", &Triple::new("alice", "lives_in", "paris", 0.9), "ep1")
            .await
            .unwrap();

        let conflicts = store
            .find_conflicts("u1", &Triple::new("alice", "lives_in", "berlin", 0.95))
            .await
            .unwrap();
        store.resolve_conflict(&conflicts[0], 0.95).await.unwrap();

        let all = store.all_relationships("u1").await;
        assert_eq!(all.len(), 1);
        assert!(all[0].valid_to.is_some());
        assert!((all[0].confidence - 0.855).abs() < 1e-9);
        assert_eq!(all[0].decay_rate, 0.95);

        // The closed edge no longer surfaces as current.
        let current = store.query_by_subject("u1", "alice").await.unwrap();
        assert!(current.is_empty());
    }

    #[tokio::test]
    async fn traversal_is_hop_bounded_and_current_only() {
        let store = MemoryGraphStore::new();
        store
            .insert_triple("u1", &Triple::new("a", "knows", "b", 0.9), "ep")
            .await
            .unwrap();
        store
            .insert_triple("u1", &Triple::new("b", "knows", "c", 0.8), "ep")
            .await
            .unwrap();
        store
            .insert_triple("u1", &Triple::new("c", "knows", "d", 0.7), "ep")
            .await
            .unwrap();

        let one_hop = store.traverse("u1", &["a".into()], 1).await.unwrap();
        assert_eq!(one_hop.len(), 1);

        let two_hops = store.traverse("u1", &["a".into()], 2).await.unwrap();
        assert_eq!(two_hops.len(), 2);

        // Close b->c; it disappears from traversal and c is unreachable.
        let conflicts = store
            .find_conflicts("u1", &Triple::new("b", "knows", "x", 0.9))
            .await
            .unwrap();
        store.resolve_conflict(&conflicts[0], 0.95).await.unwrap();

        let after = store.traverse("u1", &["a".into()], 3).await.unwrap();
        assert_eq!(after.len(), 1);
    }
}
