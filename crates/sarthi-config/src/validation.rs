// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express:
//! unique provider ids, positive quotas and TTLs, the history cap.

use std::collections::HashSet;

use sarthi_core::types::HISTORY_LIMIT;

use crate::diagnostic::ConfigError;
use crate::model::SarthiConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &SarthiConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level `{}` must be one of: {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let routing = &config.routing;
    if routing.total_budget_ms == 0 {
        errors.push(ConfigError::validation(
            "routing.total_budget_ms must be greater than 0",
        ));
    }
    if routing.history_limit > HISTORY_LIMIT {
        errors.push(ConfigError::validation(format!(
            "routing.history_limit must be at most {HISTORY_LIMIT}, got {}",
            routing.history_limit
        )));
    }
    if routing.max_message_chars == 0 {
        errors.push(ConfigError::validation(
            "routing.max_message_chars must be greater than 0",
        ));
    }
    if routing.max_tokens == 0 {
        errors.push(ConfigError::validation(
            "routing.max_tokens must be greater than 0",
        ));
    }
    if routing.degraded_message.trim().is_empty() {
        errors.push(ConfigError::validation(
            "routing.degraded_message must not be empty",
        ));
    }

    let cache = &config.cache;
    if cache.capacity == 0 {
        errors.push(ConfigError::validation("cache.capacity must be greater than 0"));
    }
    for (name, secs) in [
        ("general_ttl_secs", cache.general_ttl_secs),
        ("study_assistant_ttl_secs", cache.study_assistant_ttl_secs),
        ("degraded_ttl_secs", cache.degraded_ttl_secs),
        ("sweep_interval_secs", cache.sweep_interval_secs),
    ] {
        if secs == 0 {
            errors.push(ConfigError::validation(format!(
                "cache.{name} must be greater than 0"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    validate_providers(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_providers(config: &SarthiConfig, errors: &mut Vec<ConfigError>) {
    if !config.providers.iter().any(|p| p.enabled) {
        errors.push(ConfigError::validation(
            "at least one [[providers]] entry must be enabled",
        ));
    }

    let mut seen_ids = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        if provider.id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].id must not be empty"
            )));
        } else if !seen_ids.insert(provider.id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate provider id `{}` in [[providers]] array",
                provider.id
            )));
        }

        if provider.timeout_ms == 0 {
            errors.push(ConfigError::validation(format!(
                "providers[{i}].timeout_ms must be greater than 0"
            )));
        }

        for (w, window) in provider.windows.iter().enumerate() {
            if window.size_secs == 0 || window.limit == 0 {
                errors.push(ConfigError::validation(format!(
                    "providers[{i}].windows[{w}] size_secs and limit must be greater than 0"
                )));
            }
        }

        // Tier, model list and base_url checks share the descriptor conversion.
        if let Err(message) = provider.descriptor() {
            errors.push(ConfigError::validation(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WindowConfig;

    fn messages(config: &SarthiConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SarthiConfig::default()).is_ok());
    }

    #[test]
    fn history_limit_above_cap_fails() {
        let mut config = SarthiConfig::default();
        config.routing.history_limit = 6;
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("history_limit")));
    }

    #[test]
    fn duplicate_provider_ids_fail() {
        let mut config = SarthiConfig::default();
        let dup = config.providers[0].clone();
        config.providers.push(dup);
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("duplicate provider id `groq`")));
    }

    #[test]
    fn zero_tier_and_empty_models_both_reported() {
        let mut config = SarthiConfig::default();
        config.providers[1].tier = 0;
        config.providers[2].models.clear();
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("tier must be at least 1")));
        assert!(msgs.iter().any(|m| m.contains("models must not be empty")));
    }

    #[test]
    fn zero_window_limit_fails() {
        let mut config = SarthiConfig::default();
        config.providers[0].windows = vec![WindowConfig {
            size_secs: 60,
            limit: 0,
        }];
        assert!(messages(&config).iter().any(|m| m.contains("windows[0]")));
    }

    #[test]
    fn all_disabled_providers_fail() {
        let mut config = SarthiConfig::default();
        for p in &mut config.providers {
            p.enabled = false;
        }
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("at least one")));
    }

    #[test]
    fn zero_ttl_and_capacity_fail() {
        let mut config = SarthiConfig::default();
        config.cache.capacity = 0;
        config.cache.degraded_ttl_secs = 0;
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = SarthiConfig::default();
        config.agent.log_level = "verbose".into();
        assert!(messages(&config).iter().any(|m| m.contains("log_level")));
    }

    #[test]
    fn compat_provider_without_base_url_fails() {
        let toml_str = r#"
            [[providers]]
            id = "campus-llm"
            kind = "open_ai_compatible"
            tier = 1
            models = ["campus-7b"]
        "#;
        let config: SarthiConfig = toml::from_str(toml_str).unwrap();
        assert!(messages(&config).iter().any(|m| m.contains("base_url")));
    }

    #[test]
    fn local_ollama_chain_validates() {
        let toml_str = r#"
            [[providers]]
            id = "ollama"
            kind = "ollama"
            tier = 1
            models = ["llama3.2:3b", "qwen2.5:1.5b"]
            model_fallback = true
        "#;
        let config: SarthiConfig = toml::from_str(toml_str).unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
