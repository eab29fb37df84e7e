// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sarthi query router.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Sarthi workspace. Provider, storage, and
//! retrieval adapters implement traits defined here, as do the rate limiter
//! and response cache components.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SarthiError;
pub use types::{
    AdapterType, AttemptOutcome, AttemptRecord, ChatType, HealthStatus, Query, QueryType,
    RouteRequest, RouteResponse, Tier, TierUsed,
};

pub use traits::{
    Admission, Cache, PluginAdapter, ProviderAdapter, RateLimiter, RetrievalAdapter,
    UsageStore,
};
