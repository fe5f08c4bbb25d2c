//! Connection, callable statement and provider traits

use crate::{ResultSet, Result, SqlType, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A prepared invocation of one named stored procedure
///
/// Parameters are addressed by name. Setting or registering the same name
/// twice overwrites the earlier slot.
#[async_trait]
pub trait CallableStatement: Send {
    /// Name of the procedure this statement calls
    fn procedure(&self) -> &str;

    /// Bind an input value to the named parameter
    fn set_value(&mut self, name: &str, value: Value) -> Result<()>;

    /// Register the named parameter as an output of the given type
    fn register_out(&mut self, name: &str, sql_type: SqlType) -> Result<()>;

    /// Execute the call as an update, returning the affected row count
    async fn execute_update(&mut self) -> Result<u64>;

    /// Execute the call as a query, returning its first result set
    async fn execute_query(&mut self) -> Result<ResultSet>;

    /// Value of a registered output parameter after execution
    fn out_value(&self, name: &str) -> Option<&Value>;
}

/// A database connection able to call stored procedures
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mssql", "memory")
    fn driver_name(&self) -> &str;

    /// Prepare a callable statement for the named procedure
    async fn prepare_call(&self, procedure: &str) -> Result<Box<dyn CallableStatement>>;

    /// Switch auto-commit mode
    async fn set_auto_commit(&self, enabled: bool) -> Result<()>;

    /// Whether each statement commits on its own
    fn auto_commit(&self) -> bool;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Source of connections for one manager configuration
///
/// `open` hands out a connection with auto-commit disabled; every connection
/// obtained from `open` must be passed back to `release` exactly once.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Obtain an open connection with auto-commit disabled
    async fn open(&self) -> Result<Arc<dyn Connection>>;

    /// Give a connection back: closes it, or returns it to its pool
    async fn release(&self, connection: Arc<dyn Connection>) -> Result<()>;

    /// Short description for logs (never contains credentials)
    fn describe(&self) -> String {
        "connection provider".to_string()
    }
}
