//! Registry of the drivers a manager configuration can name

use std::collections::HashMap;
use std::sync::Arc;

use procbind_core::DatabaseDriver;

/// Drivers keyed by their `name()`
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with every driver compiled in
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "mssql")]
        registry.register(Arc::new(crate::mssql::MssqlDriver::new()));
        #[cfg(feature = "memory")]
        registry.register(Arc::new(crate::memory::MemoryDriver::new()));

        registry
    }

    /// Register a driver, replacing any driver of the same name
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering database driver");
        self.drivers.insert(name, driver);
    }

    /// Builder form of [`DriverRegistry::register`]
    pub fn with_driver(mut self, driver: Arc<dyn DatabaseDriver>) -> Self {
        self.register(driver);
        self
    }

    /// Get a driver by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&name.to_ascii_lowercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(&name.to_ascii_lowercase())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
