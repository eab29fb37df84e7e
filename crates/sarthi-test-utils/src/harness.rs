// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles a registry of [`ScriptedProvider`]s, a rate limit
//! tracker, a response cache and an orchestrator, all built from the same
//! [`SarthiConfig`]. The usage log is in memory unless the builder asks for
//! a temp SQLite database.

use std::collections::HashMap;
use std::sync::Arc;

use sarthi_cache::ResponseCache;
use sarthi_config::{ProviderConfig, SarthiConfig, WindowConfig};
use sarthi_core::traits::{ProviderAdapter, RetrievalAdapter, UsageStore};
use sarthi_core::types::{ChatType, ProviderKind, RouteRequest, RouteResponse};
use sarthi_core::SarthiError;
use sarthi_orchestrator::Orchestrator;
use sarthi_ratelimit::RateLimitTracker;
use sarthi_router::ProviderRegistry;
use sarthi_storage::SqliteUsageStore;

use crate::memory_store::MemoryUsageStore;
use crate::retrieval::StaticRetrieval;
use crate::scripted_provider::{ScriptedProvider, Step};

/// Provider config for a scripted provider: two models (`<id>-large`,
/// `<id>-small`), no quota windows, a 5 s call timeout.
pub fn scripted_config(id: &str, tier: u8) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        kind: ProviderKind::OpenAiCompatible,
        tier,
        models: vec![format!("{id}-large"), format!("{id}-small")],
        enabled: true,
        model_fallback: false,
        supports_streaming: false,
        supports_function_calling: false,
        base_url: Some("http://scripted.invalid/v1".to_string()),
        api_key_env: None,
        timeout_ms: 5_000,
        windows: Vec::new(),
    }
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: SarthiConfig,
    providers: Vec<(ProviderConfig, ScriptedProvider)>,
    profiles: Vec<(String, String)>,
    retrieval: Option<StaticRetrieval>,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: SarthiConfig {
                providers: Vec::new(),
                ..SarthiConfig::default()
            },
            providers: Vec::new(),
            profiles: Vec::new(),
            retrieval: None,
            sqlite: false,
        }
    }

    /// Add a provider with an explicit config.
    pub fn with_provider(mut self, config: ProviderConfig, provider: ScriptedProvider) -> Self {
        self.providers.push((config, provider));
        self
    }

    /// Add a scripted provider at `tier` that plays `steps` in order.
    pub fn with_tier(self, id: &str, tier: u8, steps: Vec<Step>) -> Self {
        let provider = ScriptedProvider::new(id).with_steps(steps);
        self.with_provider(scripted_config(id, tier), provider)
    }

    /// Add a scripted provider with quota windows of `(size_secs, limit)`.
    pub fn with_limited_tier(
        self,
        id: &str,
        tier: u8,
        windows: &[(u64, u32)],
        steps: Vec<Step>,
    ) -> Self {
        let mut config = scripted_config(id, tier);
        config.windows = windows
            .iter()
            .map(|&(size_secs, limit)| WindowConfig { size_secs, limit })
            .collect();
        self.with_provider(config, ScriptedProvider::new(id).with_steps(steps))
    }

    /// Adjust the rest of the configuration (routing, cache, agent).
    pub fn configure(mut self, f: impl FnOnce(&mut SarthiConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_profile(mut self, user_id: &str, profile: &str) -> Self {
        self.profiles.push((user_id.to_string(), profile.to_string()));
        self
    }

    pub fn with_retrieval(mut self, retrieval: StaticRetrieval) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Log usage to a SQLite database in a temp directory.
    pub fn with_sqlite_store(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, SarthiError> {
        let mut config = self.config;
        config.providers = self.providers.iter().map(|(c, _)| c.clone()).collect();

        let providers: HashMap<String, Arc<ScriptedProvider>> = self
            .providers
            .into_iter()
            .map(|(c, p)| (c.id, Arc::new(p)))
            .collect();

        let registry = Arc::new(ProviderRegistry::from_config(&config.providers, |d| {
            providers
                .get(&d.id)
                .map(|p| Arc::clone(p) as Arc<dyn ProviderAdapter>)
                .ok_or_else(|| SarthiError::Config(format!("no scripted provider `{}`", d.id)))
        })?);

        let snapshot = registry.snapshot();
        let tracker = Arc::new(RateLimitTracker::with_providers(
            snapshot
                .providers()
                .iter()
                .map(|p| (p.descriptor.id.as_str(), &p.descriptor.rate_limit)),
        )?);
        let cache = Arc::new(ResponseCache::new(config.cache.capacity));

        let memory_store = Arc::new(MemoryUsageStore::new());
        for (user_id, profile) in &self.profiles {
            memory_store.set_profile(user_id.as_str(), profile.as_str()).await;
        }

        let (sqlite_store, temp_dir) = if self.sqlite {
            let temp_dir = tempfile::TempDir::new().map_err(|e| SarthiError::Storage {
                source: Box::new(e),
            })?;
            let store = SqliteUsageStore::open(temp_dir.path().join("usage.db")).await?;
            for (user_id, profile) in &self.profiles {
                store.upsert_profile(user_id, profile).await?;
            }
            (Some(Arc::new(store)), Some(temp_dir))
        } else {
            (None, None)
        };

        let usage: Arc<dyn UsageStore> = match &sqlite_store {
            Some(store) => Arc::clone(store) as Arc<dyn UsageStore>,
            None => Arc::clone(&memory_store) as Arc<dyn UsageStore>,
        };

        let retrieval = self.retrieval.map(Arc::new);
        let mut orchestrator =
            Orchestrator::new(&config, Arc::clone(&registry), tracker.clone(), cache.clone())
                .with_usage_store(usage);
        if let Some(retrieval) = &retrieval {
            orchestrator =
                orchestrator.with_retrieval(Arc::clone(retrieval) as Arc<dyn RetrievalAdapter>);
        }

        Ok(TestHarness {
            orchestrator,
            registry,
            tracker,
            cache,
            memory_store,
            sqlite_store,
            retrieval,
            providers,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete routing stack with scripted collaborators.
pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub registry: Arc<ProviderRegistry>,
    pub tracker: Arc<RateLimitTracker>,
    pub cache: Arc<ResponseCache>,
    /// Usage log when no SQLite store was requested; always the profile source
    /// for in-memory runs.
    pub memory_store: Arc<MemoryUsageStore>,
    pub sqlite_store: Option<Arc<SqliteUsageStore>>,
    pub retrieval: Option<Arc<StaticRetrieval>>,
    pub config: SarthiConfig,
    providers: HashMap<String, Arc<ScriptedProvider>>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The scripted provider registered under `id`.
    pub fn provider(&self, id: &str) -> Option<&Arc<ScriptedProvider>> {
        self.providers.get(id)
    }

    /// Route a plain message with no history or pinning.
    pub async fn ask(
        &self,
        user_id: &str,
        chat_type: ChatType,
        message: &str,
    ) -> Result<RouteResponse, SarthiError> {
        self.orchestrator
            .route(RouteRequest::new(user_id, "conv-1", message, chat_type))
            .await
    }

    pub async fn route(&self, request: RouteRequest) -> Result<RouteResponse, SarthiError> {
        self.orchestrator.route(request).await
    }
}
