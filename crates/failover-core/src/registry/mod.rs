//! Plugin-based registry
//!
//! Maps the `type` names found in the configuration to factories, so the
//! daemon only knows which plug-in crates it was built with.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use failover_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! failover_provider_cloudflare::register(&registry);
//! failover_probe_tcp::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let prober = registry.create_prober(&config.prober)?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves from their own crate:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::config::{ProberConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, Prober, ProberFactory};

/// Registry of provider and prober factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
/// A poisoned lock is recovered, since the maps are never left half-written.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered prober factories
    probers: RwLock<HashMap<String, Box<dyn ProberFactory>>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a prober factory
    ///
    /// # Parameters
    ///
    /// - `name`: Prober type name (e.g., "tcp")
    /// - `factory`: Factory object for creating prober instances
    pub fn register_prober(&self, name: impl Into<String>, factory: Box<dyn ProberFactory>) {
        self.probers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Build the provider named by `config.type`
    ///
    /// Fails with `Error::Config` for an unregistered name, or with whatever
    /// the factory reports for a config it rejects.
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Build the prober named by `config.type`
    pub fn create_prober(&self, config: &ProberConfig) -> Result<Box<dyn Prober>> {
        let prober_type = config.type_name();
        let probers = self.probers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = probers
            .get(prober_type)
            .ok_or_else(|| Error::config(format!("Unknown prober type: {}", prober_type)))?;

        factory.create(config)
    }

    /// Registered provider names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered prober names, sorted
    pub fn list_probers(&self) -> Vec<String> {
        let probers = self.probers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = probers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `name` resolves to a provider factory
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Whether `name` resolves to a prober factory
    pub fn has_prober(&self, name: &str) -> bool {
        self.probers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    struct MockProberFactory;

    impl ProberFactory for MockProberFactory {
        fn create(&self, _config: &ProberConfig) -> Result<Box<dyn Prober>> {
            Err(Error::not_found("Mock prober not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();

        assert!(!registry.has_provider("mock"));
        assert!(!registry.has_prober("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));
        registry.register_prober("mock", Box::new(MockProberFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.has_prober("mock"));
        assert_eq!(registry.list_providers(), vec!["mock".to_string()]);
        assert_eq!(registry.list_probers(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = ProviderRegistry::new();

        let result = registry.create_prober(&ProberConfig::default());
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("tcp")));
    }

    #[test]
    fn test_factory_error_is_returned() {
        let registry = ProviderRegistry::new();
        registry.register_prober("tcp", Box::new(MockProberFactory));

        let result = registry.create_prober(&ProberConfig::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
