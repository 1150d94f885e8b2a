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

//! In-memory coordinator
//!
//! TTL-aware set-if-absent lock table standing in for an external KV
//! service. Single-process only; the trait contract is what matters.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use mnemos_core::{Coordinator, MemoryResult};

/// In-memory [`Coordinator`].
#[derive(Default)]
pub struct MemoryCoordinator {
    entries: DashMap<String, LockEntry>,
}

struct LockEntry {
    #[allow(dead_code)]
    value: String,
    expires_at: Instant,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live (unexpired) entry exists for the key.
    pub fn is_held(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> MemoryResult<bool> {
        let now = Instant::now();
        let fresh = || LockEntry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        let acquired = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at <= now {
                    held.insert(fresh());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(fresh());
                true
            }
        };
        Ok(acquired)
    }

    async fn delete(&self, key: &str) -> MemoryResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> MemoryResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_until_deleted() {
        let coord = MemoryCoordinator::new();
        let ttl = Duration::from_secs(60);

        assert!(coord.set_if_absent("lock:u1", "a", ttl).await.unwrap());
        assert!(!coord.set_if_absent("lock:u1", "b", ttl).await.unwrap());
        assert!(coord.is_held("lock:u1"));

        coord.delete("lock:u1").await.unwrap();
        assert!(coord.set_if_absent("lock:u1", "c", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_is_reacquirable() {
        let coord = MemoryCoordinator::new();
        assert!(coord
            .set_if_absent("lock:u1", "a", Duration::from_millis(1))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coord
            .set_if_absent("lock:u1", "b", Duration::from_secs(60))
            .await
            .unwrap());
    }
}
