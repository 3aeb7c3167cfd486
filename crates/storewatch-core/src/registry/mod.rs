//! Plugin-based component registry
//!
//! The registry lets store probes and tabular stores be registered at
//! runtime, so the daemon picks implementations by configuration instead
//! of hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storewatch_core::registry::ComponentRegistry;
//!
//! let registry = ComponentRegistry::with_builtin_stores();
//! storewatch_probe_play::register(&registry);
//! storewatch_sheets::register(&registry);
//!
//! let probe = registry.create_probe(&config.probe)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_probe("play", Box::new(PlayProbeFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ProbeConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileTabularStoreFactory, MemoryTabularStoreFactory};
use crate::traits::{StoreProbe, StoreProbeFactory, TabularStore, TabularStoreFactory};

/// Registry of probe and store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered store probe factories
    probes: RwLock<HashMap<String, Box<dyn StoreProbeFactory>>>,

    /// Registered tabular store factories
    stores: RwLock<HashMap<String, Arc<dyn TabularStoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the memory and file stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryTabularStoreFactory));
        registry.register_store("file", Box::new(FileTabularStoreFactory));
        registry
    }

    /// Register a store probe factory
    ///
    /// # Parameters
    ///
    /// - `name`: Probe type name (e.g., "play")
    /// - `factory`: Factory object for creating probe instances
    pub fn register_probe(&self, name: impl Into<String>, factory: Box<dyn StoreProbeFactory>) {
        let name = name.into();
        let mut probes = self.probes.write().unwrap_or_else(PoisonError::into_inner);
        probes.insert(name, factory);
    }

    /// Register a tabular store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "google_sheets", "file")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn TabularStoreFactory>) {
        let name = name.into();
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name, Arc::from(factory));
    }

    /// Create a store probe from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StoreProbe>)`: Created probe instance
    /// - `Err(Error)`: If the probe type is not registered or creation fails
    pub fn create_probe(&self, config: &ProbeConfig) -> Result<Box<dyn StoreProbe>> {
        let probe_type = config.type_name();
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);

        let factory = probes
            .get(probe_type)
            .ok_or_else(|| Error::config(format!("Unknown probe type: {}", probe_type)))?;

        factory.create(config)
    }

    /// Create a tabular store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn TabularStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn TabularStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
                .clone()
        };

        factory.create(config).await
    }

    /// List all registered probe types
    pub fn list_probes(&self) -> Vec<String> {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a probe type is registered
    pub fn has_probe(&self, name: &str) -> bool {
        let probes = self.probes.read().unwrap_or_else(PoisonError::into_inner);
        probes.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AppMetadata;
    use async_trait::async_trait;

    struct FixedProbe;

    #[async_trait]
    impl StoreProbe for FixedProbe {
        async fn lookup(&self, _package_id: &str) -> Result<AppMetadata> {
            Ok(AppMetadata::empty())
        }

        fn probe_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FixedProbeFactory;

    impl StoreProbeFactory for FixedProbeFactory {
        fn create(&self, _config: &ProbeConfig) -> Result<Box<dyn StoreProbe>> {
            Ok(Box::new(FixedProbe))
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = ComponentRegistry::new();
        assert!(registry.list_probes().is_empty());
        assert!(registry.list_stores().is_empty());
    }

    #[test]
    fn test_builtin_stores() {
        let registry = ComponentRegistry::with_builtin_stores();
        assert!(registry.has_store("memory"));
        assert!(registry.has_store("file"));
        assert!(!registry.has_store("google_sheets"));
    }

    #[test]
    fn test_custom_probe_by_factory_name() {
        let registry = ComponentRegistry::new();
        registry.register_probe("fixed", Box::new(FixedProbeFactory));

        let config = ProbeConfig::Custom {
            factory: "fixed".to_string(),
            config: serde_json::Value::Null,
        };
        let probe = registry.create_probe(&config).unwrap();
        assert_eq!(probe.probe_name(), "fixed");
    }

    #[test]
    fn test_unknown_probe_is_config_error() {
        let registry = ComponentRegistry::new();
        let err = registry.create_probe(&ProbeConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let registry = ComponentRegistry::with_builtin_stores();
        let store = registry.create_store(&StoreConfig::Memory).await.unwrap();
        assert_eq!(store.store_name(), "memory");
    }

    #[tokio::test]
    async fn test_unregistered_store_fails() {
        let registry = ComponentRegistry::new();
        assert!(registry.create_store(&StoreConfig::Memory).await.is_err());
    }
}
