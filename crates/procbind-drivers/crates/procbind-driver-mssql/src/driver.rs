//! MS SQL Server driver implementation

use crate::connection::MssqlConnection;
use async_trait::async_trait;
use procbind_core::{Connection, DatabaseDriver, DriverCapabilities, Result};
use std::sync::Arc;

/// MS SQL Server database driver
pub struct MssqlDriver;

impl MssqlDriver {
    /// Create a new MS SQL Server driver instance
    pub fn new() -> Self {
        tracing::debug!("MS SQL Server driver initialized");
        Self
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            supports_transactions: true,
            supports_output_parameters: true,
            supports_named_parameters: true,
        }
    }

    fn connection_string_help(&self) -> &'static str {
        "server=tcp:<host>,<port>;database=<name>;TrustServerCertificate=true"
    }

    #[tracing::instrument(skip(self, connection_string, password))]
    async fn connect(
        &self,
        connection_string: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Arc<dyn Connection>> {
        tracing::debug!("connecting to MS SQL Server");
        let connection = MssqlConnection::connect(connection_string, username, password).await?;
        Ok(Arc::new(connection))
    }
}
