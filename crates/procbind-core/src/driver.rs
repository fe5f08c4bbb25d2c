//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Capabilities that a driver may support
#[derive(Debug, Clone, Default)]
pub struct DriverCapabilities {
    /// Supports commit/rollback on a connection
    pub supports_transactions: bool,
    /// Supports OUT / INOUT parameters
    pub supports_output_parameters: bool,
    /// Resolves procedure parameters by name
    pub supports_named_parameters: bool,
}

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "mssql", "memory")
    fn name(&self) -> &'static str;

    /// Driver version
    fn version(&self) -> &'static str {
        "0.1.0"
    }

    /// Supported features/capabilities
    fn capabilities(&self) -> DriverCapabilities;

    /// Connection string format help text
    fn connection_string_help(&self) -> &'static str {
        ""
    }

    /// Open a new connection
    async fn connect(
        &self,
        connection_string: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Arc<dyn Connection>>;
}
