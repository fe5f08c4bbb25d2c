//! Connection pooling for procedure connections
//!
//! Connections are leased with [`ConnectionPool::acquire`] and handed back
//! with [`ConnectionPool::release`]. The pool keeps at most `max_size`
//! connections leased or idle and resets returned connections to manual
//! commit before reuse.
//!
//! # Example
//!
//! ```ignore
//! use procbind_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 8)
//!     .with_acquire_timeout_ms(5000)
//!     .with_idle_timeout_ms(300000);
//!
//! let pool = ConnectionPool::new(config, connection_factory);
//! let conn = pool.acquire().await?;
//! // call procedures...
//! pool.release(conn).await?;
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool};
pub use stats::PoolStats;
