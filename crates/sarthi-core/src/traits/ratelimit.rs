// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limiter seam between the orchestrator and quota bookkeeping.

use crate::error::SarthiError;
use crate::types::{RateLimitWindow, WindowStatus};

/// Result of [`RateLimiter::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call was counted; carries the status after counting it.
    Granted(WindowStatus),
    /// A window is at its limit. Nothing was counted.
    Blocked,
}

/// Per-provider quota accounting.
///
/// Implementations must make `record_attempt` linearizable per provider:
/// concurrent increments are never lost and a window rollover is never
/// observed half-applied. An `Err` means the bookkeeping itself is corrupt.
pub trait RateLimiter: Send + Sync {
    /// Most restrictive active window for the provider, or `None` when the
    /// provider has no configured quota. Applies lazy rollover only.
    fn check_status(&self, provider_id: &str) -> Result<Option<RateLimitWindow>, SarthiError>;

    /// Counts one outgoing call against every window of the provider and
    /// returns the resulting overall status.
    fn record_attempt(&self, provider_id: &str) -> Result<WindowStatus, SarthiError>;

    /// Check and count in one step: `Blocked` if any window is at its limit,
    /// otherwise counts the call like `record_attempt`. Two concurrent callers
    /// can never both take the last slot of a window.
    fn try_acquire(&self, provider_id: &str) -> Result<Admission, SarthiError>;

    /// Overall status: the worst of all active windows.
    fn status(&self, provider_id: &str) -> Result<WindowStatus, SarthiError> {
        Ok(self
            .check_status(provider_id)?
            .map(|w| w.status)
            .unwrap_or(WindowStatus::Healthy))
    }

    /// The provider itself reported an exhausted quota; block it locally
    /// until its shortest window rolls over.
    fn mark_exhausted(&self, provider_id: &str) -> Result<(), SarthiError>;
}
