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

//! Mnemos reference backends
//!
//! In-memory implementations of the capability traits from `mnemos-core`:
//! a linear-scan vector store, a bi-temporal graph store, a TTL lock table,
//! a worker-pool task queue, and a deterministic language model. They back
//! the test suites and the single-process mode; production deployments bind
//! external services (vector database, property graph, KV, LM API) behind
//! the same traits.

pub mod coordinator;
pub mod graph;
pub mod language;
pub mod queue;
pub mod vector;

pub use coordinator::MemoryCoordinator;
pub use graph::MemoryGraphStore;
pub use language::HeuristicLanguageModel;
pub use queue::LocalTaskQueue;
pub use vector::{cosine_similarity, MemoryVectorStore};
