// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived response cache for the Sarthi query router.
//!
//! [`ResponseCache`] implements [`sarthi_core::Cache`]; [`cache_key`] derives
//! the namespaced SHA-256 key for a query.

pub mod key;
pub mod store;

pub use key::{cache_key, context_fingerprint};
pub use store::ResponseCache;
