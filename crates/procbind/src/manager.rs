//! Entity managers assembled from configuration

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use procbind_connection::{
    ConnectionPool, ManagerConfig, ResourceRegistry, build_pool, build_provider,
};
use procbind_core::{Bindable, ConnectionProvider, ProcedureNames, Result, ResultMapper};
use procbind_drivers::DriverRegistry;
use procbind_query::CrudExecutor;

/// CRUD operations for one entity type, bound to a connection source
///
/// Dereferences to [`CrudExecutor`], so `manager.save(&entity)` and the other
/// operations are called directly on the manager.
pub struct EntityManager<E> {
    executor: CrudExecutor<E>,
    config: Option<ManagerConfig>,
}

impl<E: Bindable + ResultMapper> EntityManager<E> {
    /// Build a manager from configuration
    ///
    /// Pooled configurations resolve their pool by name on every call, so the
    /// pool may be bound to `resources` after the manager is built.
    #[tracing::instrument(skip_all, fields(driver = %config.driver, pooled = config.pool_enabled))]
    pub fn new(
        config: ManagerConfig,
        drivers: &DriverRegistry,
        resources: &ResourceRegistry,
    ) -> Result<Self> {
        let provider = build_provider(&config, drivers, resources)?;
        tracing::debug!(provider = %provider.describe(), "entity manager ready");
        Ok(Self {
            executor: CrudExecutor::new(provider, config.procedures.clone()),
            config: Some(config),
        })
    }

    /// Build a manager over an existing provider
    pub fn with_provider(
        provider: Arc<dyn ConnectionProvider>,
        procedures: ProcedureNames,
    ) -> Self {
        Self {
            executor: CrudExecutor::new(provider, procedures),
            config: None,
        }
    }

    /// Load a TOML configuration file and build a manager from it
    pub fn from_config_file(
        path: impl AsRef<Path>,
        drivers: &DriverRegistry,
        resources: &ResourceRegistry,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = ManagerConfig::from_file(path)?;
        Self::new(config, drivers, resources)
            .with_context(|| format!("cannot build entity manager from {}", path.display()))
    }

    /// Build a manager from the per-user configuration file
    pub fn from_default_config(
        drivers: &DriverRegistry,
        resources: &ResourceRegistry,
    ) -> anyhow::Result<Self> {
        let path = ManagerConfig::default_path().context("no configuration directory available")?;
        Self::from_config_file(path, drivers, resources)
    }

    /// Configuration the manager was built from, if any
    pub fn config(&self) -> Option<&ManagerConfig> {
        self.config.as_ref()
    }

    pub fn executor(&self) -> &CrudExecutor<E> {
        &self.executor
    }
}

impl<E> Deref for EntityManager<E> {
    type Target = CrudExecutor<E>;

    fn deref(&self) -> &Self::Target {
        &self.executor
    }
}

impl<E> Clone for EntityManager<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EntityManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish()
    }
}

/// Build the pool a configuration describes and bind it under its name
///
/// An already bound pool is kept and returned, so managers sharing a pool
/// name share one pool.
pub fn register_pool(
    config: &ManagerConfig,
    drivers: &DriverRegistry,
    resources: &ResourceRegistry,
) -> Result<Arc<ConnectionPool>> {
    let name = config
        .pool_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            procbind_core::ProcbindError::Configuration(
                "pool registration requires a pool_name".to_string(),
            )
        })?;

    if let Ok(existing) = resources.lookup(name) {
        return Ok(existing);
    }

    let pool = Arc::new(build_pool(config, drivers)?);
    resources.bind(name, pool.clone());
    tracing::info!(pool = %name, driver = %config.driver, "connection pool registered");
    Ok(pool)
}

#[cfg(test)]
mod tests;
