// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider quota accounting for the Sarthi query router.
//!
//! [`RateLimitTracker`] implements [`sarthi_core::RateLimiter`]: multiple
//! windows per provider (minute/day), healthy/warning/critical/blocked
//! thresholds at 80/95/100%, and local blocking after a remote 429.

pub mod tracker;
mod window;

pub use tracker::RateLimitTracker;
