// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response cache seam.

use std::time::Duration;

use crate::error::SarthiError;
use crate::types::{CacheEntry, CacheKey, CachedResponse};

/// TTL-bound response store.
///
/// An `Err` from any method means the cache is corrupt and is treated as a
/// fatal internal fault by the orchestrator.
pub trait Cache: Send + Sync {
    /// Returns a live entry and bumps its hit count. Expired entries are
    /// removed and reported as a miss.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, SarthiError>;

    /// Inserts or replaces an entry (last writer wins).
    fn set(
        &self,
        key: CacheKey,
        user_id: &str,
        response: CachedResponse,
        ttl: Duration,
    ) -> Result<(), SarthiError>;

    /// Removes every entry matching the predicate and returns how many went.
    fn invalidate(&self, predicate: &dyn Fn(&CacheEntry) -> bool) -> Result<usize, SarthiError>;

    /// Drops all entries belonging to one user, e.g. after new study activity.
    fn invalidate_user(&self, user_id: &str) -> Result<usize, SarthiError> {
        self.invalidate(&|entry| entry.user_id == user_id)
    }
}
