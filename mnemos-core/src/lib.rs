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

//! Mnemos core: shared data model and capability traits
//!
//! Mnemos is a cognitive memory substrate for conversational agents built
//! around two coupled stores:
//!
//! ```text
//!   Ingest (hot):   input -> Segmenter -> episodic store
//!   Query  (hot):   query -> vector + graph probes -> rerank -> pack
//!   Sleep  (cold):  Scheduler -> Worker -> cluster -> synthesize ->
//!                   extract -> resolve conflicts -> semantic store
//!                   -> mark + decay episodes
//! ```
//!
//! This crate holds what every other crate shares: the domain types
//! ([`Episode`], [`Triple`], [`GraphRelationship`], ...), the error type
//! ([`MemoryError`]), configuration ([`MnemosConfig`]), and the capability
//! traits the core consumes ([`VectorStore`], [`GraphStore`],
//! [`LanguageModel`], [`Coordinator`], [`TaskQueue`]).

pub mod api;
pub mod config;
pub mod episode;
pub mod error;
pub mod graph;
pub mod retrieval;
pub mod traits;

// Re-exports
pub use api::{IngestRequest, IngestResponse, QueryRequest, QueryResponse};
pub use config::{
    ConsolidationConfig, DigConfig, EmbeddingConfig, KnapsackConfig, MnemosConfig,
    RetrievalConfig, SegmentationConfig,
};
pub use episode::{ConsolidationStatus, ConversationTurn, Episode, MemoryKind};
pub use error::{MemoryError, MemoryResult};
pub use graph::{Cluster, ConflictRecord, GraphEntity, GraphRelationship, GraphStats, Triple};
pub use retrieval::{DigCandidate, KnapsackItem, RetrievalResult, RetrievalSource};
pub use traits::{
    ConsolidationHandler, ConsolidationTask, Coordinator, GraphStore, LanguageModel, TaskQueue,
    TokenLogProb, VectorStore,
};
