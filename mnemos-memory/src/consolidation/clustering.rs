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

//! Density-based clustering over episode embeddings
//!
//! DBSCAN in cosine-distance space (`1 - cosine_similarity`) groups
//! semantically related episodes before synthesis. Noise points survive as
//! singleton clusters (negative ids) so no episode escapes consolidation.
//! The region query is a linear scan; batches are bounded by the worker's
//! fetch limit, so O(n^2) stays cheap.

use std::collections::{HashMap, HashSet, VecDeque};

use mnemos_core::{Cluster, Episode};

const UNVISITED: i64 = -1;
const NOISE: i64 = 0;

/// DBSCAN clusterer.
pub struct Dbscan {
    epsilon: f64,
    min_points: usize,
}

impl Dbscan {
    /// Out-of-range parameters fall back to the defaults (0.3, 3).
    pub fn new(epsilon: f64, min_points: usize) -> Self {
        Self {
            epsilon: if epsilon > 0.0 { epsilon } else { 0.3 },
            min_points: if min_points > 0 { min_points } else { 3 },
        }
    }

    /// Group episodes into density clusters plus singleton noise clusters.
    pub fn cluster(&self, episodes: &[Episode]) -> Vec<Cluster> {
        let n = episodes.len();
        if n == 0 {
            return Vec::new();
        }

        let mut labels = vec![UNVISITED; n];
        let mut cluster_id = 0i64;

        for i in 0..n {
            if labels[i] != UNVISITED {
                continue;
            }

            let neighbors = self.region_query(episodes, i);
            if neighbors.len() < self.min_points {
                labels[i] = NOISE;
                continue;
            }

            cluster_id += 1;
            labels[i] = cluster_id;

            let mut seeds: HashSet<usize> = neighbors.iter().copied().collect();
            seeds.remove(&i);
            let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();

            while let Some(q) = queue.pop_front() {
                if labels[q] == NOISE {
                    labels[q] = cluster_id; // noise becomes a border point
                }
                if labels[q] != UNVISITED {
                    continue;
                }
                labels[q] = cluster_id;

                let q_neighbors = self.region_query(episodes, q);
                if q_neighbors.len() >= self.min_points {
                    for j in q_neighbors {
                        if seeds.insert(j) {
                            queue.push_back(j);
                        }
                    }
                }
            }
        }

        // Materialize clusters; leftover noise becomes singletons with
        // negative ids.
        let mut grouped: HashMap<i64, Vec<Episode>> = HashMap::new();
        for (i, &label) in labels.iter().enumerate() {
            let key = if label <= 0 { -(i as i64 + 1) } else { label };
            grouped.entry(key).or_default().push(episodes[i].clone());
        }

        let mut clusters: Vec<Cluster> = grouped
            .into_iter()
            .map(|(id, members)| {
                let centroid = compute_centroid(&members);
                Cluster {
                    id,
                    episodes: members,
                    centroid,
                }
            })
            .collect();
        clusters.sort_by_key(|c| c.id);
        clusters
    }

    fn region_query(&self, episodes: &[Episode], i: usize) -> Vec<usize> {
        (0..episodes.len())
            .filter(|&j| {
                cosine_distance(&episodes[i].embedding, &episodes[j].embedding) <= self.epsilon
            })
            .collect()
    }
}

/// 1 - cosine similarity; degenerate inputs are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
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
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Componentwise mean of member embeddings.
fn compute_centroid(episodes: &[Episode]) -> Vec<f32> {
    let Some(first) = episodes.first() else {
        return Vec::new();
    };
    let dim = first.embedding.len();
    if dim == 0 {
        return Vec::new();
    }

    let mut centroid = vec![0.0f32; dim];
    for ep in episodes {
        for (c, v) in centroid.iter_mut().zip(&ep.embedding) {
            *c += v;
        }
    }
    let n = episodes.len() as f32;
    for c in &mut centroid {
        *c /= n;
    }
    centroid
}
