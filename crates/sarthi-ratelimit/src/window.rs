// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single fixed-size quota window with lazy rollover.

use std::time::Duration;

use sarthi_core::types::{RateLimitWindow, WindowLimit, WindowStatus};
use tokio::time::Instant;

/// Mutable counter for one `(provider, window size)` pair.
///
/// The window restarts at the first touch after it expires, so an idle
/// provider costs nothing.
#[derive(Debug, Clone)]
pub(crate) struct QuotaWindow {
    size: Duration,
    limit: u32,
    start: Instant,
    count: u32,
}

impl QuotaWindow {
    pub(crate) fn new(limit: WindowLimit, now: Instant) -> Self {
        Self {
            size: limit.size,
            limit: limit.limit,
            start: now,
            count: 0,
        }
    }

    pub(crate) fn size(&self) -> Duration {
        self.size
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }

    /// Start a fresh window if `now - start >= size`. Returns whether it rolled.
    pub(crate) fn roll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.start) >= self.size {
            self.start = now;
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Count one request. The caller rolls first.
    pub(crate) fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Pin the counter at the limit until the window rolls over.
    pub(crate) fn exhaust(&mut self) {
        self.count = self.count.max(self.limit);
    }

    pub(crate) fn status(&self) -> WindowStatus {
        WindowStatus::from_usage(self.count, self.limit)
    }

    pub(crate) fn snapshot(&self, provider_id: &str) -> RateLimitWindow {
        RateLimitWindow {
            provider_id: provider_id.to_string(),
            window_start: self.start,
            window_size: self.size,
            request_count: self.count,
            limit: self.limit,
            status: self.status(),
        }
    }
}
