// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow persistence interface consumed by the orchestrator.

use async_trait::async_trait;

use crate::error::SarthiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::AttemptRecord;

/// Usage log sink and read-only profile source.
///
/// The orchestrator never depends on a write succeeding: failures are
/// logged and the request carries on.
#[async_trait]
pub trait UsageStore: PluginAdapter {
    /// Appends one attempt to the audit/usage log.
    async fn append_usage_log(&self, record: &AttemptRecord) -> Result<(), SarthiError>;

    /// Returns a rendered profile/gamification summary for context enrichment.
    async fn user_profile(&self, user_id: &str) -> Result<Option<String>, SarthiError>;
}
