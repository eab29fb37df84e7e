// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query classification and provider ranking for the Sarthi query router.
//!
//! This crate provides:
//! - [`QueryClassifier`]: keyword classification into time-sensitive,
//!   app-data and general queries
//! - [`ProviderRegistry`]: the tier-ordered provider chain, replaceable at
//!   runtime through configuration updates

pub mod classifier;
pub mod registry;

pub use classifier::QueryClassifier;
pub use registry::{ProviderRegistry, RegisteredProvider, RegistrySnapshot};
