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

//! Bi-temporal conflict resolution
//!
//! A new fact that contradicts a current relationship (same subject and
//! predicate, different object) supersedes it: the old fact's validity
//! window is closed and its confidence decayed, then the new fact is
//! inserted with fresh provenance. Historic versions accumulate; at most
//! one current relationship exists per (tenant, subject, predicate,
//! object).

use std::sync::Arc;

use tracing::{error, info, warn};

use mnemos_core::{GraphStore, MemoryResult, Triple};

/// Applies the supersede-and-insert policy for extracted triples.
pub struct ConflictResolver {
    graph: Arc<dyn GraphStore>,
    decay_rate: f64,
}

impl ConflictResolver {
    /// `decay_rate` outside (0, 1) falls back to 0.95.
    pub fn new(graph: Arc<dyn GraphStore>, decay_rate: f64) -> Self {
        let decay_rate = if decay_rate > 0.0 && decay_rate < 1.0 {
            decay_rate
        } else {
            0.95
        };
        Self { graph, decay_rate }
    }

    /// Resolve conflicts for each triple and insert it.
    ///
    /// Returns (conflicts_found, triples_inserted). Per-triple failures are
    /// logged and skipped so one bad fact cannot abort the batch.
    pub async fn resolve_and_insert(
        &self,
        tenant_id: &str,
        triples: &[Triple],
        source_episode_id: &str,
    ) -> MemoryResult<(usize, usize)> {
        let mut conflicts_found = 0usize;
        let mut triples_inserted = 0usize;

        for triple in triples {
            let conflicts = match self.graph.find_conflicts(tenant_id, triple).await {
                Ok(conflicts) => conflicts,
                Err(e) => {
                    error!(tenant_id, triple = %triple, error = %e, "conflict detection failed");
                    continue;
                }
            };

            conflicts_found += conflicts.len();
            for conflict in &conflicts {
                info!(
                    tenant_id,
                    existing = %conflict.existing_triple,
                    new = %triple,
                    "conflict detected, superseding"
                );
                if let Err(e) = self.graph.resolve_conflict(conflict, self.decay_rate).await {
                    warn!(
                        tenant_id,
                        rel_id = %conflict.existing_rel_id,
                        error = %e,
                        "failed to close superseded fact"
                    );
                    // Keep going; the new fact still wins.
                }
            }

            match self
                .graph
                .insert_triple(tenant_id, triple, source_episode_id)
                .await
            {
                Ok(()) => triples_inserted += 1,
                Err(e) => {
                    error!(tenant_id, triple = %triple, error = %e, "triple insertion failed, dropped");
                }
            }
        }

        Ok((conflicts_found, triples_inserted))
    }
}
