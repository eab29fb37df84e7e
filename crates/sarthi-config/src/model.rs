// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sarthi query router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use sarthi_core::types::{
    Capabilities, ProviderDescriptor, ProviderKind, RateLimitConfig, Tier, WindowLimit,
};
use serde::{Deserialize, Serialize};

/// Top-level Sarthi configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SarthiConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Fallback chain behavior.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Response cache sizing and TTLs.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Usage log database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ranked provider chain. Replaces the built-in chain when present.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for SarthiConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            routing: RoutingConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            providers: default_providers(),
        }
    }
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and the system prompt.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "sarthi".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fallback orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Wall-clock budget for all attempts of one query, in milliseconds.
    /// Once spent, the orchestrator degrades even if tiers remain.
    #[serde(default = "default_total_budget_ms")]
    pub total_budget_ms: u64,

    /// Prior turns forwarded to providers. Capped at 4.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Same-tier retries with a lower model before advancing, for providers
    /// with `model_fallback = true`.
    #[serde(default = "default_max_model_retries")]
    pub max_model_retries: u32,

    /// Longest accepted message, in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Max tokens requested from providers.
    #[serde(default = "default_routing_max_tokens")]
    pub max_tokens: u32,

    /// Documents requested from the retrieval adapter when augmenting.
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Upper bound on the profile lookup and on retrieval, each, in
    /// milliseconds. Also capped by what is left of the total budget.
    #[serde(default = "default_context_timeout_ms")]
    pub context_timeout_ms: u64,

    /// Longest wait for one usage log append, in milliseconds. A slow store
    /// loses the record instead of delaying the reply.
    #[serde(default = "default_usage_log_timeout_ms")]
    pub usage_log_timeout_ms: u64,

    /// Fixed reply used when every tier is exhausted.
    #[serde(default = "default_degraded_message")]
    pub degraded_message: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            total_budget_ms: default_total_budget_ms(),
            history_limit: default_history_limit(),
            max_model_retries: default_max_model_retries(),
            max_message_chars: default_max_message_chars(),
            max_tokens: default_routing_max_tokens(),
            retrieval_limit: default_retrieval_limit(),
            context_timeout_ms: default_context_timeout_ms(),
            usage_log_timeout_ms: default_usage_log_timeout_ms(),
            degraded_message: default_degraded_message(),
        }
    }
}

impl RoutingConfig {
    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms)
    }

    pub fn context_timeout(&self) -> Duration {
        Duration::from_millis(self.context_timeout_ms)
    }

    pub fn usage_log_timeout(&self) -> Duration {
        Duration::from_millis(self.usage_log_timeout_ms)
    }
}

fn default_total_budget_ms() -> u64 {
    45_000
}

fn default_history_limit() -> usize {
    4
}

fn default_max_model_retries() -> u32 {
    1
}

fn default_max_message_chars() -> usize {
    4000
}

fn default_routing_max_tokens() -> u32 {
    1024
}

fn default_retrieval_limit() -> usize {
    3
}

fn default_context_timeout_ms() -> u64 {
    2_000
}

fn default_usage_log_timeout_ms() -> u64 {
    250
}

fn default_degraded_message() -> String {
    "Service temporarily limited, please retry shortly.".to_string()
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Disable to always call providers.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of entries across all namespaces.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// TTL for `general` chat responses (6 hours).
    #[serde(default = "default_general_ttl_secs")]
    pub general_ttl_secs: u64,

    /// TTL for `study_assistant` responses (1 hour): study data changes often.
    #[serde(default = "default_study_assistant_ttl_secs")]
    pub study_assistant_ttl_secs: u64,

    /// TTL for degraded responses, long enough to shed load during an outage.
    #[serde(default = "default_degraded_ttl_secs")]
    pub degraded_ttl_secs: u64,

    /// Interval of the background expiry sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
            general_ttl_secs: default_general_ttl_secs(),
            study_assistant_ttl_secs: default_study_assistant_ttl_secs(),
            degraded_ttl_secs: default_degraded_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_general_ttl_secs() -> u64 {
    6 * 60 * 60
}

fn default_study_assistant_ttl_secs() -> u64 {
    60 * 60
}

fn default_degraded_ttl_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// Usage log storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sarthi").join("sarthi.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("sarthi.db"))
        .to_string_lossy()
        .into_owned()
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider identifier, used in logs and pinned requests.
    pub id: String,

    /// Provider family.
    pub kind: ProviderKind,

    /// Rank, 1 = tried first.
    pub tier: u8,

    /// Models, most capable first.
    pub models: Vec<String>,

    #[serde(default = "default_provider_enabled")]
    pub enabled: bool,

    /// Allow same-tier retries with the next listed model.
    #[serde(default)]
    pub model_fallback: bool,

    #[serde(default)]
    pub supports_streaming: bool,

    #[serde(default)]
    pub supports_function_calling: bool,

    /// Overrides the family's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Overrides the family's default API key variable.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    /// Quota windows. Empty means no local accounting.
    #[serde(default)]
    pub windows: Vec<WindowConfig>,
}

/// One quota window: `limit` requests per `size_secs`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub size_secs: u64,
    pub limit: u32,
}

fn default_provider_enabled() -> bool {
    true
}

fn default_provider_timeout_ms() -> u64 {
    20_000
}

impl ProviderConfig {
    /// Convert into a validated descriptor.
    ///
    /// Semantic checks also run in [`crate::validation`]; this is the last
    /// gate before a descriptor reaches the registry.
    pub fn descriptor(&self) -> Result<ProviderDescriptor, String> {
        let tier = Tier::new(self.tier)
            .ok_or_else(|| format!("provider `{}`: tier must be at least 1", self.id))?;
        if self.models.iter().all(|m| m.trim().is_empty()) {
            return Err(format!("provider `{}`: models must not be empty", self.id));
        }
        if self.kind == ProviderKind::OpenAiCompatible && self.base_url.is_none() {
            return Err(format!(
                "provider `{}`: kind `open_ai_compatible` requires base_url",
                self.id
            ));
        }

        Ok(ProviderDescriptor {
            id: self.id.clone(),
            kind: self.kind,
            tier,
            capabilities: Capabilities {
                supports_streaming: self.supports_streaming,
                supports_function_calling: self.supports_function_calling,
            },
            models: self
                .models
                .iter()
                .filter(|m| !m.trim().is_empty())
                .cloned()
                .collect(),
            model_fallback: self.model_fallback,
            rate_limit: RateLimitConfig {
                windows: self
                    .windows
                    .iter()
                    .map(|w| WindowLimit {
                        size: Duration::from_secs(w.size_secs),
                        limit: w.limit,
                    })
                    .collect(),
                timeout: Duration::from_millis(self.timeout_ms),
            },
            enabled: self.enabled,
            base_url: self.base_url.clone(),
            api_key_env: self
                .api_key_env
                .clone()
                .or_else(|| self.kind.default_api_key_env().map(str::to_string)),
        })
    }
}

/// Built-in three-tier chain of free-tier friendly providers.
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "groq".to_string(),
            kind: ProviderKind::Groq,
            tier: 1,
            models: vec![
                "llama-3.3-70b-versatile".to_string(),
                "llama-3.1-8b-instant".to_string(),
            ],
            enabled: true,
            model_fallback: true,
            supports_streaming: true,
            supports_function_calling: true,
            base_url: None,
            api_key_env: None,
            timeout_ms: 15_000,
            windows: vec![
                WindowConfig {
                    size_secs: 60,
                    limit: 30,
                },
                WindowConfig {
                    size_secs: 86_400,
                    limit: 14_400,
                },
            ],
        },
        ProviderConfig {
            id: "gemini".to_string(),
            kind: ProviderKind::Gemini,
            tier: 2,
            models: vec!["gemini-2.0-flash".to_string()],
            enabled: true,
            model_fallback: false,
            supports_streaming: true,
            supports_function_calling: true,
            base_url: None,
            api_key_env: None,
            timeout_ms: 20_000,
            windows: vec![
                WindowConfig {
                    size_secs: 60,
                    limit: 15,
                },
                WindowConfig {
                    size_secs: 86_400,
                    limit: 1_500,
                },
            ],
        },
        ProviderConfig {
            id: "openrouter".to_string(),
            kind: ProviderKind::OpenRouter,
            tier: 3,
            models: vec!["meta-llama/llama-3.3-70b-instruct:free".to_string()],
            enabled: true,
            model_fallback: false,
            supports_streaming: true,
            supports_function_calling: false,
            base_url: None,
            api_key_env: None,
            timeout_ms: 25_000,
            windows: vec![
                WindowConfig {
                    size_secs: 60,
                    limit: 20,
                },
                WindowConfig {
                    size_secs: 86_400,
                    limit: 200,
                },
            ],
        },
    ]
}
