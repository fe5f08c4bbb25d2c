//! procbind drivers - concrete database drivers
//!
//! This crate bundles the driver implementations of the `DatabaseDriver`
//! trait from `procbind-core` behind cargo features and a name-keyed
//! registry.

#[cfg(feature = "memory")]
pub use procbind_driver_memory as memory;
#[cfg(feature = "mssql")]
pub use procbind_driver_mssql as mssql;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from procbind-core
pub use procbind_core::{Connection, DatabaseDriver, DriverCapabilities, ProcbindError, Result};
