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

//! Memory system error types

use thiserror::Error;

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur in the memory system
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed request or domain invariant violation
    #[error("validation: {0}")]
    Validation(String),

    /// A backing service (store, LM provider, coordinator) failed
    #[error("external service: {0}")]
    ExternalService(String),

    /// Entity, episode, or relationship not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A deadline elapsed before the operation completed
    #[error("timeout: {0}")]
    Timeout(String),

    /// An exclusion lock is already held
    #[error("lock held: {0}")]
    LockHeld(String),

    /// Unexpected internal failure
    #[error("internal: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Short machine-readable kind, used in logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::Validation(_) => "validation",
            MemoryError::ExternalService(_) => "external_service",
            MemoryError::NotFound(_) => "not_found",
            MemoryError::Timeout(_) => "timeout",
            MemoryError::LockHeld(_) => "conflict",
            MemoryError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Internal(format!("serialization: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(MemoryError::Validation("x".into()).kind(), "validation");
        assert_eq!(MemoryError::Timeout("x".into()).kind(), "timeout");
        assert_eq!(MemoryError::LockHeld("x".into()).kind(), "conflict");
    }
}
