// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ranked provider registry.
//!
//! Holds validated [`ProviderDescriptor`]s paired with their adapters. Readers
//! take a cheap snapshot per request; configuration reloads swap the whole
//! snapshot atomically, so a request never sees a half-applied chain.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use sarthi_config::ProviderConfig;
use sarthi_core::error::SarthiError;
use sarthi_core::traits::ProviderAdapter;
use sarthi_core::types::{ProviderDescriptor, Tier};
use tracing::info;

/// A descriptor and the adapter that serves it.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    /// Sorted by tier, then by configuration order within a tier.
    providers: Vec<Arc<RegisteredProvider>>,
}

impl RegistrySnapshot {
    fn build(entries: Vec<RegisteredProvider>) -> Result<Self, SarthiError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let d = &entry.descriptor;
            if !seen.insert(d.id.clone()) {
                return Err(SarthiError::Config(format!(
                    "duplicate provider id `{}`",
                    d.id
                )));
            }
            if d.models.is_empty() {
                return Err(SarthiError::Config(format!(
                    "provider `{}` has no models",
                    d.id
                )));
            }
        }

        let mut providers: Vec<Arc<RegisteredProvider>> =
            entries.into_iter().map(Arc::new).collect();
        // Stable: configuration order breaks ties within a tier.
        providers.sort_by_key(|p| p.descriptor.tier);
        Ok(Self { providers })
    }

    /// Providers grouped by ascending tier. Disabled providers are included;
    /// the fallback chain skips them.
    pub fn tiers(&self) -> Vec<(Tier, Vec<Arc<RegisteredProvider>>)> {
        let mut grouped: BTreeMap<Tier, Vec<Arc<RegisteredProvider>>> = BTreeMap::new();
        for provider in &self.providers {
            grouped
                .entry(provider.descriptor.tier)
                .or_default()
                .push(Arc::clone(provider));
        }
        grouped.into_iter().collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<RegisteredProvider>> {
        self.providers
            .iter()
            .find(|p| p.descriptor.id == id)
            .cloned()
    }

    pub fn providers(&self) -> &[Arc<RegisteredProvider>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Hot-swappable provider registry.
#[derive(Debug)]
pub struct ProviderRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl ProviderRegistry {
    pub fn new(entries: Vec<RegisteredProvider>) -> Result<Self, SarthiError> {
        Ok(Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::build(entries)?),
        })
    }

    /// Build from `[[providers]]` config, creating one adapter per descriptor.
    pub fn from_config<F>(configs: &[ProviderConfig], mut make_adapter: F) -> Result<Self, SarthiError>
    where
        F: FnMut(&ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError>,
    {
        Self::new(build_entries(configs, &mut make_adapter)?)
    }

    /// The current snapshot. Hold it for the duration of one request.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    pub fn tiers(&self) -> Vec<(Tier, Vec<Arc<RegisteredProvider>>)> {
        self.current.load().tiers()
    }

    pub fn get(&self, id: &str) -> Option<Arc<RegisteredProvider>> {
        self.current.load().get(id)
    }

    /// Atomically replace the provider chain. In-flight requests keep the
    /// snapshot they started with. On error the current chain is untouched.
    pub fn replace(&self, entries: Vec<RegisteredProvider>) -> Result<(), SarthiError> {
        let snapshot = RegistrySnapshot::build(entries)?;
        info!(providers = snapshot.providers.len(), "provider registry replaced");
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Replace the chain from fresh configuration.
    pub fn reload<F>(&self, configs: &[ProviderConfig], mut make_adapter: F) -> Result<(), SarthiError>
    where
        F: FnMut(&ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError>,
    {
        self.replace(build_entries(configs, &mut make_adapter)?)
    }
}

fn build_entries<F>(
    configs: &[ProviderConfig],
    make_adapter: &mut F,
) -> Result<Vec<RegisteredProvider>, SarthiError>
where
    F: FnMut(&ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError>,
{
    configs
        .iter()
        .map(|config| {
            let descriptor = config.descriptor().map_err(SarthiError::Config)?;
            let adapter = make_adapter(&descriptor)?;
            Ok(RegisteredProvider {
                descriptor,
                adapter,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sarthi_core::traits::PluginAdapter;
    use sarthi_core::types::{
        AdapterType, HealthStatus, ProviderKind, ProviderRequest, ProviderResponse,
    };

    use super::*;

    struct Named(String);

    #[async_trait]
    impl PluginAdapter for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Provider
        }
        async fn health_check(&self) -> Result<HealthStatus, SarthiError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl ProviderAdapter for Named {
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, SarthiError> {
            Err(SarthiError::provider("not scripted"))
        }
    }

    fn config(id: &str, tier: u8) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            kind: ProviderKind::Groq,
            tier,
            models: vec!["m".into()],
            enabled: true,
            model_fallback: false,
            supports_streaming: false,
            supports_function_calling: false,
            base_url: None,
            api_key_env: None,
            timeout_ms: 1000,
            windows: vec![],
        }
    }

    fn named(d: &ProviderDescriptor) -> Result<Arc<dyn ProviderAdapter>, SarthiError> {
        Ok(Arc::new(Named(d.id.clone())))
    }

    #[test]
    fn tiers_are_ascending_and_keep_config_order() {
        let registry = ProviderRegistry::from_config(
            &[config("c", 3), config("a1", 1), config("b", 2), config("a2", 1)],
            named,
        )
        .unwrap();

        let tiers = registry.tiers();
        let layout: Vec<(u8, Vec<String>)> = tiers
            .iter()
            .map(|(t, ps)| (t.get(), ps.iter().map(|p| p.descriptor.id.clone()).collect()))
            .collect();
        assert_eq!(
            layout,
            vec![
                (1, vec!["a1".to_string(), "a2".to_string()]),
                (2, vec!["b".to_string()]),
                (3, vec!["c".to_string()]),
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ProviderRegistry::from_config(&[config("a", 1), config("a", 2)], named)
            .unwrap_err();
        assert!(matches!(err, SarthiError::Config(m) if m.contains("duplicate")));
    }

    #[test]
    fn invalid_descriptor_is_a_config_error() {
        let err = ProviderRegistry::from_config(&[config("zero", 0)], named).unwrap_err();
        assert!(matches!(err, SarthiError::Config(_)));
    }

    #[test]
    fn replace_swaps_atomically_and_old_snapshot_survives() {
        let registry = ProviderRegistry::from_config(&[config("old", 1)], named).unwrap();
        let before = registry.snapshot();

        registry.reload(&[config("new", 1)], named).unwrap();
        assert!(registry.get("old").is_none());
        assert!(registry.get("new").is_some());
        assert!(before.get("old").is_some());
    }

    #[test]
    fn failed_replace_keeps_current_chain() {
        let registry = ProviderRegistry::from_config(&[config("keep", 1)], named).unwrap();
        assert!(registry.reload(&[config("x", 1), config("x", 1)], named).is_err());
        assert!(registry.get("keep").is_some());
    }
}
