//! Addin registry.
//!
//! Maps the addin name found in an [`AdapterConfig`] to a factory building
//! the hardware implementation. A configured addin with no registered
//! factory is fatal: the adapter cannot be constructed.

use std::collections::BTreeMap;
use std::fmt;

use egm_core::{AdapterConfig, DeviceKind, Error, Result};
use tracing::{debug, error};

type Factory<I> = Box<dyn Fn(&AdapterConfig) -> Result<I> + Send + Sync>;

pub struct AddinRegistry<I> {
    kind: DeviceKind,
    factories: BTreeMap<String, Factory<I>>,
}

impl<I> AddinRegistry<I> {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&AdapterConfig) -> Result<I> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registered {} addin '{}'", self.kind, name);
        self.factories.insert(name, Box::new(factory));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the implementation selected by `config.addin`.
    ///
    /// # Errors
    ///
    /// [`Error::ImplementationMissing`] if no factory is registered for the
    /// addin or the config names another device kind; otherwise whatever
    /// the factory returns.
    pub fn create(&self, config: &AdapterConfig) -> Result<I> {
        let factory = self
            .factories
            .get(&config.addin)
            .filter(|_| config.kind == self.kind)
            .ok_or_else(|| {
                error!("No {} implementation for addin '{}'", config.kind, config.addin);
                Error::ImplementationMissing {
                    kind: config.kind,
                    addin: config.addin.clone(),
                }
            })?;
        factory(config)
    }
}

impl<I> fmt::Debug for AddinRegistry<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddinRegistry")
            .field("kind", &self.kind)
            .field("addins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AddinRegistry<String> {
        let mut registry = AddinRegistry::new(DeviceKind::Printer);
        registry.register("mock", |config| Ok(format!("mock#{}", config.index)));
        registry
    }

    #[test]
    fn test_create_registered_addin() {
        let config = AdapterConfig::new(DeviceKind::Printer, "mock").index(2);
        assert_eq!(registry().create(&config).unwrap(), "mock#2");
    }

    #[test]
    fn test_missing_addin_is_fatal() {
        let config = AdapterConfig::new(DeviceKind::Printer, "JCM GDS");
        let result = registry().create(&config);
        assert!(matches!(
            result,
            Err(Error::ImplementationMissing { kind: DeviceKind::Printer, ref addin }) if addin == "JCM GDS"
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let config = AdapterConfig::new(DeviceKind::NoteAcceptor, "mock");
        assert!(matches!(
            registry().create(&config),
            Err(Error::ImplementationMissing { .. })
        ));
    }

    #[test]
    fn test_names() {
        let mut registry = registry();
        registry.register("alt", |_| Ok(String::new()));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["alt", "mock"]);
    }
}
