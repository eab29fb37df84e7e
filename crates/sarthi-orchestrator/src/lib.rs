// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query routing with tiered fallback for the Sarthi query router.
//!
//! The [`Orchestrator`] classifies a query, consults the response cache, then
//! walks the provider chain tier by tier. Blocked providers are skipped
//! without I/O, failed calls advance the chain, and when every tier is spent
//! the caller receives a fixed degraded reply instead of an error.
//!
//! # Components
//!
//! - [`Orchestrator`] - the fallback state machine
//! - [`FallbackChain`] - per-request tier cursor and attempt counts
//! - [`PromptBuilder`] - persona, context and capped history assembly
//! - [`validator`] - output language policies

pub mod chain;
pub mod orchestrator;
pub mod prompt;
pub mod validator;

pub use chain::FallbackChain;
pub use orchestrator::Orchestrator;
pub use prompt::PromptBuilder;
pub use validator::{OutputIssue, OutputPolicy, Verdict, validate};
