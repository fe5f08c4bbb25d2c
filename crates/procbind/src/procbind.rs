//! procbind - entity managers over stored procedures
//!
//! An [`EntityManager`] saves, deletes, fetches and lists entities by calling
//! four configured stored procedures. Entities and filters describe their
//! procedure parameters through [`Bindable`] metadata; result rows come back
//! through [`ResultMapper`].
//!
//! ```ignore
//! let drivers = DriverRegistry::with_defaults();
//! let resources = ResourceRegistry::new();
//! let customers: EntityManager<Customer> =
//!     EntityManager::from_config_file("manager.toml", &drivers, &resources)?;
//! let response = customers.save(&customer).await?;
//! ```

pub mod logging;
mod manager;

pub use manager::{EntityManager, register_pool};

pub use procbind_connection::{
    ConnectionPool, DirectProvider, ManagerConfig, PoolConfig, PoolStats, PooledProvider,
    ResourceRegistry, build_pool, build_provider,
};
pub use procbind_core::{
    AttributeMetadata, Bindable, CallableStatement, Connection, ConnectionProvider,
    DatabaseDriver, EntityList, ErrorKind, FieldBinding, FromValue, ParamDirection, ProcbindError,
    ProcedureNames, Result, ResultMapper, ResultSet, Row, SqlType, Value, map_by_metadata,
};
pub use procbind_drivers::DriverRegistry;
#[cfg(feature = "memory")]
pub use procbind_drivers::memory;
#[cfg(feature = "mssql")]
pub use procbind_drivers::mssql;
pub use procbind_query::{
    CrudExecutor, EntityResponse, ListResponse, Parameter, Response, WriteResponse,
    extract_parameters,
};
