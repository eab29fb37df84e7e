// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sarthi.toml` > `~/.config/sarthi/sarthi.toml` > `/etc/sarthi/sarthi.toml`
//! with environment variable overrides via `SARTHI_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SarthiConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sarthi/sarthi.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sarthi.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sarthi/sarthi.toml` (system-wide)
/// 3. `~/.config/sarthi/sarthi.toml` (user XDG config)
/// 4. `./sarthi.toml` (local directory)
/// 5. `SARTHI_*` environment variables
pub fn load_config() -> Result<SarthiConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SarthiConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SarthiConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SarthiConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SarthiConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SarthiConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/sarthi/sarthi.toml`, if the platform has a config dir.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("sarthi").join(LOCAL_CONFIG_FILE))
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys such as
/// `SARTHI_ROUTING_TOTAL_BUDGET_MS` must map to `routing.total_budget_ms`,
/// not `routing.total.budget.ms`. Only the first section separator is
/// rewritten. Provider entries are arrays and are not env-addressable.
fn env_provider() -> Env {
    Env::prefixed("SARTHI_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["agent", "routing", "cache", "storage"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
