// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request fallback chain state.

use std::collections::BTreeMap;
use std::sync::Arc;

use sarthi_core::types::{QueryType, Tier};
use sarthi_router::RegisteredProvider;

/// Ordered tiers for one request. The cursor only moves forward.
#[derive(Debug)]
pub struct FallbackChain {
    query_type: QueryType,
    tiers: Vec<(Tier, Vec<Arc<RegisteredProvider>>)>,
    current_tier_index: usize,
    calls_by_tier: BTreeMap<Tier, u32>,
    last_error: Option<String>,
}

impl FallbackChain {
    /// `tiers` must be sorted ascending; tiers with no enabled provider are dropped.
    pub fn new(query_type: QueryType, tiers: Vec<(Tier, Vec<Arc<RegisteredProvider>>)>) -> Self {
        let tiers = tiers
            .into_iter()
            .filter_map(|(tier, providers)| {
                let enabled: Vec<_> = providers
                    .into_iter()
                    .filter(|p| p.descriptor.enabled)
                    .collect();
                (!enabled.is_empty()).then_some((tier, enabled))
            })
            .collect();
        Self {
            query_type,
            tiers,
            current_tier_index: 0,
            calls_by_tier: BTreeMap::new(),
            last_error: None,
        }
    }

    /// A chain holding a single pinned provider.
    pub fn pinned(query_type: QueryType, provider: Arc<RegisteredProvider>) -> Self {
        let tier = provider.descriptor.tier;
        Self {
            query_type,
            tiers: vec![(tier, vec![provider])],
            current_tier_index: 0,
            calls_by_tier: BTreeMap::new(),
            last_error: None,
        }
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// The tier under the cursor, or `None` once every tier is spent.
    pub fn current(&self) -> Option<(Tier, &[Arc<RegisteredProvider>])> {
        self.tiers
            .get(self.current_tier_index)
            .map(|(tier, providers)| (*tier, providers.as_slice()))
    }

    /// Move to the next tier. Never rewinds.
    pub fn advance(&mut self) {
        if self.current_tier_index < self.tiers.len() {
            self.current_tier_index += 1;
        }
    }

    /// True once the cursor is past the last tier.
    pub fn is_exhausted(&self) -> bool {
        self.current_tier_index >= self.tiers.len()
    }

    /// Count a network call against its tier. Local skips are not counted.
    pub fn record_call(&mut self, tier: Tier) {
        *self.calls_by_tier.entry(tier).or_default() += 1;
    }

    /// Network calls made across all tiers.
    pub fn total_calls(&self) -> u32 {
        self.calls_by_tier.values().sum()
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use sarthi_core::types::{
        Capabilities, ProviderDescriptor, ProviderKind, ProviderRequest, ProviderResponse,
        RateLimitConfig,
    };
    use sarthi_core::{PluginAdapter, ProviderAdapter, SarthiError};
    use std::time::Duration;

    use super::*;

    struct Idle;

    #[async_trait::async_trait]
    impl PluginAdapter for Idle {
        fn name(&self) -> &str {
            "idle"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> sarthi_core::AdapterType {
            sarthi_core::AdapterType::Provider
        }
        async fn health_check(&self) -> Result<sarthi_core::HealthStatus, SarthiError> {
            Ok(sarthi_core::HealthStatus::Healthy)
        }
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for Idle {
        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, SarthiError> {
            Err(SarthiError::provider("idle"))
        }
    }

    fn provider(id: &str, tier: u8, enabled: bool) -> Arc<RegisteredProvider> {
        Arc::new(RegisteredProvider {
            descriptor: ProviderDescriptor {
                id: id.into(),
                kind: ProviderKind::Groq,
                tier: Tier::new(tier).unwrap(),
                capabilities: Capabilities::default(),
                models: vec!["m".into()],
                model_fallback: false,
                rate_limit: RateLimitConfig {
                    windows: vec![],
                    timeout: Duration::from_secs(1),
                },
                enabled,
                base_url: None,
                api_key_env: None,
            },
            adapter: Arc::new(Idle),
        })
    }

    fn t(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    #[test]
    fn disabled_only_tiers_are_dropped() {
        let chain = FallbackChain::new(
            QueryType::General,
            vec![
                (t(1), vec![provider("off", 1, false)]),
                (t(2), vec![provider("on", 2, true)]),
            ],
        );
        let (tier, providers) = chain.current().unwrap();
        assert_eq!(tier, t(2));
        assert_eq!(providers[0].descriptor.id, "on");
    }

    #[test]
    fn advance_is_monotonic_and_saturates() {
        let mut chain = FallbackChain::new(
            QueryType::General,
            vec![(t(1), vec![provider("a", 1, true)])],
        );
        assert!(!chain.is_exhausted());
        chain.advance();
        chain.advance();
        assert!(chain.is_exhausted());
        assert!(chain.current().is_none());
    }

    #[test]
    fn calls_are_counted_across_tiers() {
        let mut chain = FallbackChain::new(QueryType::AppData, vec![]);
        chain.record_call(t(1));
        chain.record_call(t(1));
        chain.record_call(t(3));
        chain.set_last_error("boom");
        assert_eq!(chain.total_calls(), 3);
        assert_eq!(chain.last_error(), Some("boom"));
        assert_eq!(chain.query_type(), QueryType::AppData);
    }
}
