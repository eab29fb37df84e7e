// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sarthi providers` command implementation.
//!
//! Lists the provider chain in tier order with each provider's quota status,
//! adapter health and, when the usage log is available, historical outcome
//! counts.

use std::collections::BTreeMap;

use sarthi_config::SarthiConfig;
use sarthi_core::SarthiError;
use sarthi_core::traits::RateLimiter;
use sarthi_core::types::{HealthStatus, WindowStatus};
use serde::Serialize;
use tokio::time::Instant;

use crate::stack::Stack;

/// One row of `--json` output.
#[derive(Debug, Serialize)]
pub struct ProviderRow {
    pub id: String,
    pub tier: u8,
    pub kind: String,
    pub enabled: bool,
    pub models: Vec<String>,
    pub status: WindowStatus,
    pub health: String,
    pub windows: Vec<WindowRow>,
    /// Outcome name to count, from the usage log.
    pub outcomes: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct WindowRow {
    pub size_secs: u64,
    pub used: u32,
    pub limit: u32,
    pub status: WindowStatus,
    pub resets_in_secs: u64,
}

/// Run the `sarthi providers` command.
pub async fn run_providers(config: &SarthiConfig, json: bool) -> Result<(), SarthiError> {
    let stack = Stack::build(config).await?;
    let rows = collect_rows(&stack).await;
    stack.shutdown().await;
    let rows = rows?;

    if json {
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| SarthiError::Internal(format!("failed to encode providers: {e}")))?;
        println!("{out}");
    } else {
        print_table(&rows);
    }
    Ok(())
}

async fn collect_rows(stack: &Stack) -> Result<Vec<ProviderRow>, SarthiError> {
    let now = Instant::now();
    let windows = stack.tracker.snapshot()?;
    let health: BTreeMap<String, HealthStatus> = stack.provider_health().await.into_iter().collect();

    let mut rows = Vec::new();
    for provider in stack.registry.snapshot().providers() {
        let d = &provider.descriptor;
        let window_rows = windows
            .get(&d.id)
            .map(|ws| {
                ws.iter()
                    .map(|w| WindowRow {
                        size_secs: w.window_size.as_secs(),
                        used: w.request_count,
                        limit: w.limit,
                        status: w.status,
                        resets_in_secs: w.resets_in(now).as_secs(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        rows.push(ProviderRow {
            id: d.id.clone(),
            tier: d.tier.get(),
            kind: d.kind.to_string(),
            enabled: d.enabled,
            models: d.models.clone(),
            status: stack.tracker.status(&d.id)?,
            health: health
                .get(&d.id)
                .map(describe_health)
                .unwrap_or_else(|| "unknown".to_string()),
            windows: window_rows,
            outcomes: outcome_counts(stack, &d.id).await,
        });
    }
    Ok(rows)
}

#[cfg(feature = "sqlite")]
async fn outcome_counts(stack: &Stack, provider_id: &str) -> BTreeMap<String, u64> {
    let Some(store) = &stack.store else {
        return BTreeMap::new();
    };
    match store.provider_outcome_counts(provider_id).await {
        Ok(counts) => counts
            .into_iter()
            .map(|(outcome, n)| (outcome.to_string(), n))
            .collect(),
        Err(e) => {
            tracing::warn!(provider = provider_id, error = %e, "failed to read outcome counts");
            BTreeMap::new()
        }
    }
}

#[cfg(not(feature = "sqlite"))]
async fn outcome_counts(_stack: &Stack, _provider_id: &str) -> BTreeMap<String, u64> {
    BTreeMap::new()
}

fn describe_health(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

fn print_table(rows: &[ProviderRow]) {
    let mut current_tier = None;
    for row in rows {
        if current_tier != Some(row.tier) {
            println!("tier {}", row.tier);
            current_tier = Some(row.tier);
        }
        let enabled = if row.enabled { "" } else { " (disabled)" };
        println!(
            "  {:<14} {:<18} {:<8} {}{}",
            row.id,
            row.kind,
            row.status.to_string(),
            row.health,
            enabled
        );
        println!("    models: {}", row.models.join(", "));
        for w in &row.windows {
            println!(
                "    window {}s: {}/{} ({}, resets in {}s)",
                w.size_secs, w.used, w.limit, w.status, w.resets_in_secs
            );
        }
        if !row.outcomes.is_empty() {
            let counts: Vec<String> = row
                .outcomes
                .iter()
                .map(|(outcome, n)| format!("{outcome}={n}"))
                .collect();
            println!("    history: {}", counts.join(" "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_descriptions() {
        assert_eq!(describe_health(&HealthStatus::Healthy), "healthy");
        assert_eq!(
            describe_health(&HealthStatus::Degraded("API key not set".into())),
            "degraded: API key not set"
        );
    }

    #[test]
    fn json_rows_use_snake_case_status() {
        let row = WindowRow {
            size_secs: 60,
            used: 29,
            limit: 30,
            status: WindowStatus::Critical,
            resets_in_secs: 12,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "critical");
        assert_eq!(json["used"], 29);
    }
}
