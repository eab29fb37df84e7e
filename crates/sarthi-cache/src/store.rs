// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory TTL response cache.
//!
//! Entries expire lazily on read and in a periodic sweep. When the cache is
//! full, expired entries go first, then the oldest entry by `created_at`.
//! Writes are last-writer-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sarthi_core::error::SarthiError;
use sarthi_core::traits::Cache;
use sarthi_core::types::{CacheEntry, CacheKey, CachedResponse};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Bounded response cache keyed by [`CacheKey`].
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> Result<usize, SarthiError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SarthiError> {
        Ok(self.lock()?.is_empty())
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, SarthiError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.purge_expired() {
                            Ok(0) => {}
                            Ok(removed) => debug!(removed, "cache sweep removed expired entries"),
                            Err(e) => {
                                error!(error = %e, "cache sweep failed, stopping sweeper");
                                break;
                            }
                        }
                    }
                    _ = cancel.cancelled() => {
                        info!("cache sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, CacheEntry>>, SarthiError> {
        self.entries
            .lock()
            .map_err(|_| SarthiError::Internal("response cache lock poisoned".into()))
    }
}

impl Cache for ResponseCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, SarthiError> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        let expired = match entries.get_mut(key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                entry.hit_count += 1;
                return Ok(Some(entry.clone()));
            }
        };

        if expired {
            entries.remove(key);
            debug!(namespace = %key.namespace, "cache entry expired on read");
        }
        Ok(None)
    }

    fn set(
        &self,
        key: CacheKey,
        user_id: &str,
        response: CachedResponse,
        ttl: Duration,
    ) -> Result<(), SarthiError> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| !entry.is_expired(now));
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    debug!(namespace = %oldest.namespace, "cache full, evicted oldest entry");
                }
            }
        }

        entries.insert(
            key.clone(),
            CacheEntry {
                key,
                user_id: user_id.to_string(),
                response,
                created_at: now,
                expires_at: now + ttl,
                hit_count: 0,
            },
        );
        Ok(())
    }

    fn invalidate(&self, predicate: &dyn Fn(&CacheEntry) -> bool) -> Result<usize, SarthiError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| !predicate(entry));
        Ok(before - entries.len())
    }
}
