//! procbind core - abstractions shared by every procbind crate
//!
//! This crate defines:
//!
//! - `Connection` / `CallableStatement` - named-parameter stored-procedure calls
//! - `ConnectionProvider` - source of auto-commit-off connections
//! - `DatabaseDriver` - opens connections from a connection string
//! - `Bindable` / `AttributeMetadata` - declared attribute bindings of entities and filters
//! - `ResultMapper` - turns one result row into one entity
//! - Common types like `Value`, `SqlType`, `Row` and `ResultSet`

mod connection;
mod driver;
mod entity;
mod error;
mod procedure;
mod types;

pub use connection::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use procedure::*;
pub use types::*;
