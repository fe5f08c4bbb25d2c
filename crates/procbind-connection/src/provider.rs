//! Direct and pooled connection providers

use std::sync::Arc;

use async_trait::async_trait;
use procbind_core::{Connection, ConnectionProvider, DatabaseDriver, ProcbindError, Result};
use procbind_drivers::DriverRegistry;

use crate::config::ManagerConfig;
use crate::pool::{ConnectionFactory, ConnectionPool};
use crate::registry::ResourceRegistry;

/// Opens driver connections from a connection string and credentials
#[derive(Clone)]
pub struct DriverConnectionFactory {
    driver: Arc<dyn DatabaseDriver>,
    connection_string: String,
    username: Option<String>,
    password: Option<String>,
}

impl DriverConnectionFactory {
    pub fn new(
        driver: Arc<dyn DatabaseDriver>,
        connection_string: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            driver,
            connection_string: connection_string.into(),
            username,
            password,
        }
    }

    /// Factory for the driver and credentials named by a configuration
    pub fn from_config(config: &ManagerConfig, drivers: &DriverRegistry) -> Result<Self> {
        let driver = drivers.get(&config.driver).ok_or_else(|| {
            ProcbindError::Configuration(format!("unknown driver {}", config.driver))
        })?;
        Ok(Self::new(
            driver,
            config.connection_string.clone(),
            config.username.clone(),
            config.password.clone(),
        ))
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.driver
            .connect(
                &self.connection_string,
                self.username.as_deref(),
                self.password.as_deref(),
            )
            .await
            .map_err(connection_error)
    }

    fn describe(&self) -> String {
        match &self.username {
            Some(user) => format!("{} as {}", self.driver.name(), user),
            None => self.driver.name().to_string(),
        }
    }
}

/// Provider that opens a new driver connection per call and closes it on release
pub struct DirectProvider {
    factory: DriverConnectionFactory,
}

impl DirectProvider {
    pub fn new(factory: DriverConnectionFactory) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ConnectionProvider for DirectProvider {
    #[tracing::instrument(skip(self), fields(provider = %self.factory.describe()))]
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        let connection = self.factory.create().await?;
        if let Err(err) = connection.set_auto_commit(false).await {
            let _ = connection.close().await;
            return Err(connection_error(err));
        }
        tracing::debug!("direct connection opened");
        Ok(connection)
    }

    async fn release(&self, connection: Arc<dyn Connection>) -> Result<()> {
        connection.close().await
    }

    fn describe(&self) -> String {
        format!("direct {}", self.factory.describe())
    }
}

/// Provider that resolves a named pool on every open
pub struct PooledProvider {
    resources: ResourceRegistry,
    pool_name: String,
}

impl PooledProvider {
    pub fn new(resources: ResourceRegistry, pool_name: impl Into<String>) -> Self {
        Self {
            resources,
            pool_name: pool_name.into(),
        }
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }
}

#[async_trait]
impl ConnectionProvider for PooledProvider {
    #[tracing::instrument(skip(self), fields(pool = %self.pool_name))]
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        let pool = self.resources.lookup(&self.pool_name)?;
        pool.acquire().await.map_err(connection_error)
    }

    async fn release(&self, connection: Arc<dyn Connection>) -> Result<()> {
        match self.resources.lookup(&self.pool_name) {
            Ok(pool) => pool.release(connection).await,
            Err(_) => {
                // the pool was unbound while the connection was out
                tracing::debug!(pool = %self.pool_name, "pool gone, closing connection");
                connection.close().await
            }
        }
    }

    fn describe(&self) -> String {
        format!("pool {}", self.pool_name)
    }
}

/// Build a pool from the direct-connection settings of a configuration
pub fn build_pool(config: &ManagerConfig, drivers: &DriverRegistry) -> Result<ConnectionPool> {
    let factory = DriverConnectionFactory::from_config(config, drivers)?;
    let pool_config = config.pool.clone().unwrap_or_default();
    pool_config.validate()?;
    Ok(ConnectionPool::new(pool_config, factory))
}

/// Select the provider a configuration asks for
pub fn build_provider(
    config: &ManagerConfig,
    drivers: &DriverRegistry,
    resources: &ResourceRegistry,
) -> Result<Arc<dyn ConnectionProvider>> {
    config.validate()?;

    if config.pool_enabled {
        let pool_name = config.pool_name.clone().unwrap_or_default();
        tracing::debug!(pool = %pool_name, "using pooled provider");
        return Ok(Arc::new(PooledProvider::new(resources.clone(), pool_name)));
    }

    let factory = DriverConnectionFactory::from_config(config, drivers)?;
    tracing::debug!(driver = %config.driver, "using direct provider");
    Ok(Arc::new(DirectProvider::new(factory)))
}

fn connection_error(err: ProcbindError) -> ProcbindError {
    match err {
        ProcbindError::Connection(_) | ProcbindError::Timeout(_) => err,
        other => ProcbindError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests;
