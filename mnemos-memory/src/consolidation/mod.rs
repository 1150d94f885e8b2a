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

//! Consolidation: the cold path
//!
//! Periodically distills clusters of recent episodes into durable facts in
//! the knowledge graph, resolving contradictions bi-temporally, then marks
//! and decays the consumed episodes. Eventually consistent with the hot
//! paths by design.

pub mod clustering;
pub mod conflict;
pub mod scheduler;
pub mod worker;

pub use clustering::Dbscan;
pub use conflict::ConflictResolver;
pub use scheduler::{lock_key, Scheduler, TriggerReason};
pub use worker::{run_lock_key, Worker};
