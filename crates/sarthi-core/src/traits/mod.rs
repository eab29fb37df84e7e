// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and component trait definitions.
//!
//! External collaborators extend [`PluginAdapter`] and use `#[async_trait]`
//! for dynamic dispatch. The in-process components ([`RateLimiter`],
//! [`Cache`]) are synchronous: they only guard short critical sections.

pub mod adapter;
pub mod cache;
pub mod provider;
pub mod ratelimit;
pub mod retrieval;
pub mod storage;

pub use adapter::PluginAdapter;
pub use cache::Cache;
pub use provider::ProviderAdapter;
pub use ratelimit::{Admission, RateLimiter};
pub use retrieval::RetrievalAdapter;
pub use storage::UsageStore;
