// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limit tracking across all registered providers.
//!
//! The tracker keeps in-memory counters for every quota window of every
//! provider. It emits a `tracing::warn` when a provider crosses 80% or 95% of
//! any window and reports `Blocked` at 100%, so the orchestrator can skip the
//! provider without a network call.
//!
//! Rollover and increment happen in one critical section of a
//! `std::sync::Mutex`; the lock is never held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use sarthi_core::error::SarthiError;
use sarthi_core::traits::{Admission, RateLimiter};
use sarthi_core::types::{RateLimitConfig, RateLimitWindow, WindowStatus};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::window::QuotaWindow;

/// In-memory per-provider quota tracker.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    providers: Mutex<HashMap<String, Vec<QuotaWindow>>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tracker with one entry per `(provider_id, config)` pair.
    pub fn with_providers<'a, I>(providers: I) -> Result<Self, SarthiError>
    where
        I: IntoIterator<Item = (&'a str, &'a RateLimitConfig)>,
    {
        let tracker = Self::new();
        for (id, config) in providers {
            tracker.register(id, config)?;
        }
        Ok(tracker)
    }

    /// Install or update the windows of one provider.
    ///
    /// Windows whose size and limit are unchanged keep their counters, so a
    /// configuration reload does not hand out a fresh quota.
    pub fn register(&self, provider_id: &str, config: &RateLimitConfig) -> Result<(), SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        let previous = providers.remove(provider_id).unwrap_or_default();

        let windows = config
            .windows
            .iter()
            .map(|limit| {
                previous
                    .iter()
                    .find(|w| w.size() == limit.size && w.limit() == limit.limit)
                    .cloned()
                    .unwrap_or_else(|| QuotaWindow::new(*limit, now))
            })
            .collect();

        providers.insert(provider_id.to_string(), windows);
        Ok(())
    }

    /// Every window of every provider, after lazy rollover. Sorted by provider id.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<RateLimitWindow>>, SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        Ok(providers
            .iter_mut()
            .map(|(id, windows)| {
                let views = windows
                    .iter_mut()
                    .map(|w| {
                        w.roll(now);
                        w.snapshot(id)
                    })
                    .collect();
                (id.clone(), views)
            })
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<QuotaWindow>>>, SarthiError> {
        self.providers
            .lock()
            .map_err(|_| SarthiError::Internal("rate limit tracker lock poisoned".into()))
    }
}

/// The window that restricts the provider most. Ties go to the window that
/// stays restrictive longest.
fn most_restrictive(provider_id: &str, windows: &[QuotaWindow], now: Instant) -> Option<RateLimitWindow> {
    windows
        .iter()
        .map(|w| w.snapshot(provider_id))
        .max_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then_with(|| a.resets_in(now).cmp(&b.resets_in(now)))
        })
}

/// Count one call against every (already rolled) window and warn on each
/// threshold crossed. Returns the worst resulting status.
fn count_call(provider_id: &str, windows: &mut [QuotaWindow]) -> WindowStatus {
    let mut overall = WindowStatus::Healthy;
    for window in windows.iter_mut() {
        let before = window.status();
        window.increment();
        let after = window.status();

        if after > before && after >= WindowStatus::Warning {
            let view = window.snapshot(provider_id);
            warn!(
                provider = provider_id,
                window_secs = view.window_size.as_secs(),
                request_count = view.request_count,
                limit = view.limit,
                status = %after,
                "provider quota threshold crossed"
            );
        }
        overall = overall.max(after);
    }
    overall
}

impl RateLimiter for RateLimitTracker {
    fn check_status(&self, provider_id: &str) -> Result<Option<RateLimitWindow>, SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        let Some(windows) = providers.get_mut(provider_id) else {
            return Ok(None);
        };
        for window in windows.iter_mut() {
            window.roll(now);
        }
        Ok(most_restrictive(provider_id, windows, now))
    }

    fn record_attempt(&self, provider_id: &str) -> Result<WindowStatus, SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        let Some(windows) = providers.get_mut(provider_id) else {
            return Ok(WindowStatus::Healthy);
        };
        for window in windows.iter_mut() {
            window.roll(now);
        }
        Ok(count_call(provider_id, windows))
    }

    fn try_acquire(&self, provider_id: &str) -> Result<Admission, SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        let Some(windows) = providers.get_mut(provider_id) else {
            return Ok(Admission::Granted(WindowStatus::Healthy));
        };
        for window in windows.iter_mut() {
            window.roll(now);
        }
        if windows.iter().any(|w| w.status() == WindowStatus::Blocked) {
            return Ok(Admission::Blocked);
        }
        Ok(Admission::Granted(count_call(provider_id, windows)))
    }

    fn mark_exhausted(&self, provider_id: &str) -> Result<(), SarthiError> {
        let now = Instant::now();
        let mut providers = self.lock()?;
        let shortest = providers
            .get_mut(provider_id)
            .and_then(|windows| windows.iter_mut().min_by_key(|w| w.size()));

        match shortest {
            Some(window) => {
                window.roll(now);
                window.exhaust();
                warn!(
                    provider = provider_id,
                    window_secs = window.size().as_secs(),
                    "provider reported quota exhaustion, blocking until rollover"
                );
            }
            None => debug!(
                provider = provider_id,
                "provider has no quota windows, exhaustion not tracked"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sarthi_core::types::WindowLimit;
    use tracing_test::traced_test;

    use super::*;

    fn config(windows: &[(u64, u32)]) -> RateLimitConfig {
        RateLimitConfig {
            windows: windows
                .iter()
                .map(|&(secs, limit)| WindowLimit {
                    size: Duration::from_secs(secs),
                    limit,
                })
                .collect(),
            timeout: Duration::from_secs(10),
        }
    }

    fn tracker(windows: &[(u64, u32)]) -> RateLimitTracker {
        let cfg = config(windows);
        RateLimitTracker::with_providers([("groq", &cfg)]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_provider_has_no_quota() {
        let tracker = RateLimitTracker::new();
        assert!(tracker.check_status("nobody").unwrap().is_none());
        assert_eq!(tracker.status("nobody").unwrap(), WindowStatus::Healthy);
        assert_eq!(tracker.record_attempt("nobody").unwrap(), WindowStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_at_limit_and_healthy_after_rollover() {
        let tracker = tracker(&[(60, 3)]);
        for _ in 0..3 {
            tracker.record_attempt("groq").unwrap();
        }
        assert_eq!(tracker.status("groq").unwrap(), WindowStatus::Blocked);

        tokio::time::advance(Duration::from_secs(60)).await;
        let window = tracker.check_status("groq").unwrap().unwrap();
        assert_eq!(window.request_count, 0);
        assert_eq!(window.status, WindowStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn check_status_does_not_count() {
        let tracker = tracker(&[(60, 5)]);
        tracker.record_attempt("groq").unwrap();
        for _ in 0..10 {
            tracker.check_status("groq").unwrap();
        }
        assert_eq!(tracker.check_status("groq").unwrap().unwrap().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn most_restrictive_window_wins() {
        // Minute window is roomy, day window is nearly spent.
        let tracker = tracker(&[(60, 100), (86_400, 2)]);
        tracker.record_attempt("groq").unwrap();
        assert_eq!(tracker.record_attempt("groq").unwrap(), WindowStatus::Blocked);

        tokio::time::advance(Duration::from_secs(120)).await;
        let window = tracker.check_status("groq").unwrap().unwrap();
        assert_eq!(window.window_size, Duration::from_secs(86_400));
        assert_eq!(window.status, WindowStatus::Blocked);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_exhausted_pins_shortest_window() {
        let tracker = tracker(&[(3600, 1000), (60, 30)]);
        tracker.mark_exhausted("groq").unwrap();

        let window = tracker.check_status("groq").unwrap().unwrap();
        assert_eq!(window.status, WindowStatus::Blocked);
        assert_eq!(window.window_size, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(tracker.status("groq").unwrap(), WindowStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn register_keeps_counters_for_unchanged_windows() {
        let tracker = tracker(&[(60, 10), (86_400, 100)]);
        tracker.record_attempt("groq").unwrap();
        tracker.register("groq", &config(&[(60, 10), (86_400, 50)])).unwrap();

        let snapshot = tracker.snapshot().unwrap();
        let counts: Vec<u32> = snapshot["groq"].iter().map(|w| w.request_count).collect();
        assert_eq!(counts, vec![1, 0]);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn warns_once_when_crossing_eighty_percent() {
        let tracker = tracker(&[(60, 10)]);
        for _ in 0..8 {
            tracker.record_attempt("groq").unwrap();
        }
        assert!(logs_contain("provider quota threshold crossed"));
        assert!(logs_contain("status=warning"));
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_refuses_without_counting() {
        let tracker = tracker(&[(60, 2)]);
        assert_eq!(
            tracker.try_acquire("groq").unwrap(),
            Admission::Granted(WindowStatus::Healthy)
        );
        assert_eq!(
            tracker.try_acquire("groq").unwrap(),
            Admission::Granted(WindowStatus::Blocked)
        );
        assert_eq!(tracker.try_acquire("groq").unwrap(), Admission::Blocked);
        assert_eq!(tracker.check_status("groq").unwrap().unwrap().request_count, 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(matches!(
            tracker.try_acquire("groq").unwrap(),
            Admission::Granted(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_never_lost() {
        let tracker = std::sync::Arc::new(tracker(&[(3600, 10_000)]));
        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        tracker.record_attempt("groq").unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let window = tracker.check_status("groq").unwrap().unwrap();
        assert_eq!(window.request_count, 64 * 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquires_never_exceed_the_limit() {
        let tracker = std::sync::Arc::new(tracker(&[(3600, 10)]));
        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.try_acquire("groq").unwrap() })
            })
            .collect();

        let mut granted = 0;
        for task in tasks {
            if let Admission::Granted(_) = task.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert_eq!(tracker.check_status("groq").unwrap().unwrap().request_count, 10);
    }

    #[test]
    fn poisoned_lock_is_internal_error() {
        let tracker = std::sync::Arc::new(RateLimitTracker::new());
        let clone = tracker.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.providers.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = tracker.check_status("groq").unwrap_err();
        assert!(matches!(err, SarthiError::Internal(_)));
    }
}
