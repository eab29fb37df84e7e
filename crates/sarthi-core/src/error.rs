// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sarthi query router.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Sarthi adapter traits and core operations.
///
/// Only [`SarthiError::InvalidRequest`] and [`SarthiError::Internal`] are ever
/// returned to callers of the orchestrator. Every provider-side failure is
/// absorbed into an attempt record and a fallback.
#[derive(Debug, Error)]
pub enum SarthiError {
    /// Malformed or empty input, rejected before orchestration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider quota exhausted, either by the local tracker or by the remote API.
    #[error("rate limit exceeded for provider `{provider}`")]
    RateLimited {
        provider: String,
        /// Remote hint for when the quota resets, if the provider sent one.
        retry_after: Option<Duration>,
    },

    /// Provider call exceeded its timeout and was cancelled.
    #[error("provider `{provider}` timed out after {duration:?}")]
    Timeout { provider: String, duration: Duration },

    /// LLM provider errors (API failure, unparseable body, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generated output was empty or violated the active language policy.
    #[error("output validation failed: {0}")]
    Validation(String),

    /// Every configured tier failed. Resolved internally by graceful degradation.
    #[error("all provider tiers exhausted")]
    ExhaustedChain,

    /// Configuration errors (invalid TOML, unknown provider, bad descriptor).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Retrieval collaborator errors (search backend unavailable).
    #[error("retrieval error: {message}")]
    Retrieval { message: String },

    /// Internal or unexpected errors, e.g. a poisoned cache lock.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SarthiError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        SarthiError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error must propagate to the caller instead of being
    /// absorbed by the fallback chain.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SarthiError::InvalidRequest(_) | SarthiError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_request_and_internal_errors_are_fatal() {
        assert!(SarthiError::InvalidRequest("empty".into()).is_fatal());
        assert!(SarthiError::Internal("poisoned".into()).is_fatal());
        assert!(!SarthiError::ExhaustedChain.is_fatal());
        assert!(!SarthiError::provider("boom").is_fatal());
        assert!(
            !SarthiError::Timeout {
                provider: "groq".into(),
                duration: Duration::from_secs(5),
            }
            .is_fatal()
        );
    }

    #[test]
    fn rate_limited_message_names_provider() {
        let err = SarthiError::RateLimited {
            provider: "gemini".into(),
            retry_after: None,
        };
        assert_eq!(err.to_string(), "rate limit exceeded for provider `gemini`");
    }
}
