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

//! Mnemos memory engine
//!
//! The two hot paths and the cold path of the cognitive memory
//! architecture:
//!
//! ```text
//!   Ingest:  input -> SurprisalSegmenter -> VectorStore::upsert
//!   Query:   query -> Retriever (vector || graph) -> Reranker (DIG)
//!                  -> Optimizer (knapsack) -> assembled context
//!   Sleep:   Scheduler -> Worker -> Dbscan -> synthesize -> extract
//!                  -> ConflictResolver -> GraphStore
//!                  -> mark consolidated + decay
//! ```
//!
//! Tenants are fully independent: rolling surprisal statistics,
//! conversation buffers, and activity timestamps are all keyed by tenant
//! in concurrent maps and hydrated lazily.

pub mod consolidation;
pub mod dig;
pub mod ingest;
pub mod knapsack;
pub mod retrieval;
pub mod segmentation;
pub mod workspace;

pub use consolidation::{ConflictResolver, Dbscan, Scheduler, Worker};
pub use dig::Reranker;
pub use ingest::IngestService;
pub use knapsack::{Optimizer, SelectionResult};
pub use retrieval::Retriever;
pub use segmentation::{RollingStats, SurprisalSegmenter};
pub use workspace::Workspace;
