//! Manager configuration: where connections come from and which procedures to call

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use procbind_core::{ProcbindError, ProcedureNames, Result};
use serde::{Deserialize, Serialize};

use crate::pool::PoolConfig;

const ENV_PREFIX: &str = "PROCBIND_";

/// Connection and procedure settings of one entity manager
///
/// ```toml
/// driver = "mssql"
/// connection_string = "server=tcp:db.local,1433;database=crm"
/// username = "app"
///
/// [procedures]
/// save = "usp_customer_save"
/// delete = "usp_customer_delete"
/// get = "usp_customer_get"
/// list = "usp_customer_list"
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Driver name as registered in the driver registry
    pub driver: String,
    /// Driver connection string, used when pooling is off
    pub connection_string: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Resolve connections through a named pool instead of the driver
    pub pool_enabled: bool,
    /// Name the pool is registered under in the resource registry
    pub pool_name: Option<String>,
    pub procedures: ProcedureNames,
    /// Settings for a pool built from this configuration
    pub pool: Option<PoolConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            driver: "mssql".to_string(),
            connection_string: String::new(),
            username: None,
            password: None,
            pool_enabled: false,
            pool_name: None,
            procedures: ProcedureNames::default(),
            pool: None,
        }
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("driver", &self.driver)
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("pool_enabled", &self.pool_enabled)
            .field("pool_name", &self.pool_name)
            .field("procedures", &self.procedures)
            .field("pool", &self.pool)
            .finish()
    }
}

impl ManagerConfig {
    /// Direct-connection configuration
    pub fn direct(driver: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Pooled configuration resolving `pool_name` through the resource registry
    pub fn pooled(pool_name: impl Into<String>) -> Self {
        Self {
            pool_enabled: true,
            pool_name: Some(pool_name.into()),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_procedures(mut self, procedures: ProcedureNames) -> Self {
        self.procedures = procedures;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Parse a TOML document and apply `PROCBIND_*` environment overrides
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let mut config: Self =
            toml::from_str(source).context("failed to parse manager configuration")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and apply `PROCBIND_*` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// `<config dir>/procbind/manager.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("procbind").join("manager.toml"))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialize manager configuration")
    }

    /// Override settings from the process environment
    ///
    /// Recognised variables: `PROCBIND_DRIVER`, `PROCBIND_CONNECTION_STRING`,
    /// `PROCBIND_USERNAME`, `PROCBIND_PASSWORD` and `PROCBIND_POOL_NAME`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override settings from any variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        if let Some(driver) = var("DRIVER") {
            self.driver = driver;
        }
        if let Some(connection_string) = var("CONNECTION_STRING") {
            self.connection_string = connection_string;
        }
        if let Some(username) = var("USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = var("PASSWORD") {
            self.password = Some(password);
        }
        if let Some(pool_name) = var("POOL_NAME") {
            self.pool_name = Some(pool_name);
        }
    }

    /// Check that the selected connection mode has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.pool_enabled {
            if self.pool_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                return Err(ProcbindError::Configuration(
                    "pool_enabled requires a pool_name".to_string(),
                ));
            }
        } else {
            if self.driver.trim().is_empty() {
                return Err(ProcbindError::Configuration("no driver configured".to_string()));
            }
            if self.connection_string.trim().is_empty() {
                return Err(ProcbindError::Configuration(
                    "direct connections require a connection_string".to_string(),
                ));
            }
        }
        if let Some(pool) = &self.pool {
            pool.validate()?;
        }
        Ok(())
    }
}
