// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles the routing stack from configuration.

use std::sync::Arc;
use std::time::Duration;

use sarthi_cache::ResponseCache;
use sarthi_config::SarthiConfig;
use sarthi_core::SarthiError;
use sarthi_core::traits::ProviderAdapter;
use sarthi_core::types::{HealthStatus, ProviderDescriptor};
use sarthi_orchestrator::Orchestrator;
use sarthi_ratelimit::RateLimitTracker;
use sarthi_router::ProviderRegistry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(feature = "sqlite")]
use sarthi_storage::SqliteUsageStore;

/// Everything one process needs to route queries.
pub struct Stack {
    pub orchestrator: Orchestrator,
    pub registry: Arc<ProviderRegistry>,
    pub tracker: Arc<RateLimitTracker>,
    #[cfg(feature = "sqlite")]
    pub store: Option<Arc<SqliteUsageStore>>,
    cancel: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl Stack {
    pub async fn build(config: &SarthiConfig) -> Result<Self, SarthiError> {
        let registry = Arc::new(ProviderRegistry::from_config(&config.providers, make_adapter)?);

        let snapshot = registry.snapshot();
        let tracker = Arc::new(RateLimitTracker::with_providers(
            snapshot
                .providers()
                .iter()
                .map(|p| (p.descriptor.id.as_str(), &p.descriptor.rate_limit)),
        )?);

        let cache = Arc::new(ResponseCache::new(config.cache.capacity));
        let cancel = CancellationToken::new();
        let sweeper = Arc::clone(&cache).spawn_sweeper(
            Duration::from_secs(config.cache.sweep_interval_secs),
            cancel.clone(),
        );

        #[allow(unused_mut)]
        let mut orchestrator =
            Orchestrator::new(config, Arc::clone(&registry), tracker.clone(), cache);

        #[cfg(feature = "sqlite")]
        let store = match SqliteUsageStore::from_config(&config.storage).await {
            Ok(store) => {
                let store = Arc::new(store);
                orchestrator = orchestrator.with_usage_store(store.clone());
                Some(store)
            }
            Err(e) => {
                warn!(
                    path = %config.storage.database_path,
                    error = %e,
                    "usage log unavailable, routing without it"
                );
                None
            }
        };

        info!(
            providers = snapshot.providers().len(),
            tiers = snapshot.tiers().len(),
            "routing stack ready"
        );

        Ok(Self {
            orchestrator,
            registry,
            tracker,
            #[cfg(feature = "sqlite")]
            store,
            cancel,
            sweeper,
        })
    }

    /// Health of every registered provider adapter, in chain order.
    pub async fn provider_health(&self) -> Vec<(String, HealthStatus)> {
        let mut out = Vec::new();
        for provider in self.registry.snapshot().providers() {
            let status = provider
                .adapter
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
            out.push((provider.descriptor.id.clone(), status));
        }
        out
    }

    /// Stop background tasks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.sweeper.await {
            warn!(error = %e, "cache sweeper did not stop cleanly");
        }
    }
}

#[cfg(feature = "openai")]
fn make_adapter(descriptor: &ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError> {
    let provider = sarthi_openai::OpenAiCompatProvider::new(descriptor)?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn make_adapter(descriptor: &ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError> {
    Err(SarthiError::Config(format!(
        "provider `{}` needs the `openai` feature",
        descriptor.id
    )))
}
