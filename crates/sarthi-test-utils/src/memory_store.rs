// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`UsageStore`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sarthi_core::traits::{PluginAdapter, UsageStore};
use sarthi_core::types::{AdapterType, AttemptRecord, HealthStatus};
use sarthi_core::SarthiError;

/// Keeps attempt records and profiles in memory. Appends can be made to fail,
/// and appends or profile lookups can be made to never finish.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: Mutex<Vec<AttemptRecord>>,
    profiles: Mutex<HashMap<String, String>>,
    fail_appends: AtomicBool,
    stall_appends: AtomicBool,
    stall_profiles: AtomicBool,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_profile(&self, user_id: impl Into<String>, profile: impl Into<String>) {
        self.profiles
            .lock()
            .await
            .insert(user_id.into(), profile.into());
    }

    /// Make every subsequent append return a storage error.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent append hang until the caller gives up.
    pub fn stall_appends(&self, stall: bool) {
        self.stall_appends.store(stall, Ordering::SeqCst);
    }

    /// Make every subsequent profile lookup hang until the caller gives up.
    pub fn stall_profiles(&self, stall: bool) {
        self.stall_profiles.store(stall, Ordering::SeqCst);
    }

    /// Every record appended so far, in order.
    pub async fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MemoryUsageStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SarthiError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn append_usage_log(&self, record: &AttemptRecord) -> Result<(), SarthiError> {
        if self.stall_appends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SarthiError::Storage {
                source: "usage log unavailable".into(),
            });
        }
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<String>, SarthiError> {
        if self.stall_profiles.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.profiles.lock().await.get(user_id).cloned())
    }
}
