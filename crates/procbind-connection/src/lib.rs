//! procbind connection - connection providers, pooling and configuration
//!
//! This crate turns a [`ManagerConfig`] into a [`ConnectionProvider`]:
//! either a direct provider that opens one driver connection per call, or a
//! pooled provider that resolves a named pool through a [`ResourceRegistry`].

mod config;
pub mod pool;
mod provider;
mod registry;

pub use config::ManagerConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats};
pub use procbind_core::ConnectionProvider;
pub use provider::{
    DirectProvider, DriverConnectionFactory, PooledProvider, build_pool, build_provider,
};
pub use registry::ResourceRegistry;
