// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sarthi integration tests.
//!
//! Scripted collaborators and a harness that wires a complete routing stack
//! without network access.
//!
//! # Components
//!
//! - [`ScriptedProvider`] - provider adapter that plays back a queue of [`Step`]s
//! - [`MemoryUsageStore`] - in-memory usage log and profile source
//! - [`StaticRetrieval`] - fixed document set for augmentation
//! - [`TestHarness`] - registry, tracker, cache and orchestrator in one place

pub mod harness;
pub mod memory_store;
pub mod retrieval;
pub mod scripted_provider;

pub use harness::{TestHarness, TestHarnessBuilder, scripted_config};
pub use memory_store::MemoryUsageStore;
pub use retrieval::StaticRetrieval;
pub use scripted_provider::{ScriptedProvider, Step};
