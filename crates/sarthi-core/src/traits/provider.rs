// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM inference backends.

use async_trait::async_trait;

use crate::error::SarthiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for one LLM inference provider.
///
/// Implementations must report failures with typed errors so the
/// orchestrator can derive an [`AttemptOutcome`](crate::types::AttemptOutcome)
/// without inspecting message text:
/// - quota responses as [`SarthiError::RateLimited`]
/// - request deadlines as [`SarthiError::Timeout`]
/// - everything else as [`SarthiError::Provider`]
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SarthiError>;
}
