//! Named resources that pooled providers resolve at open time

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use procbind_core::{ProcbindError, Result};

use crate::pool::ConnectionPool;

/// Naming service mapping resource names to connection pools
///
/// Cloning yields another handle to the same bindings, so pools bound
/// after a provider was built are visible to it.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    pools: Arc<RwLock<HashMap<String, Arc<ConnectionPool>>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a pool under a name, returning the pool it replaced
    pub fn bind(
        &self,
        name: impl Into<String>,
        pool: Arc<ConnectionPool>,
    ) -> Option<Arc<ConnectionPool>> {
        let name = name.into();
        tracing::debug!(resource = %name, "binding connection pool");
        self.pools.write().insert(name, pool)
    }

    pub fn unbind(&self, name: &str) -> Option<Arc<ConnectionPool>> {
        self.pools.write().remove(name)
    }

    /// Resolve a name; unknown names are connection errors
    pub fn lookup(&self, name: &str) -> Result<Arc<ConnectionPool>> {
        self.pools.read().get(name).cloned().ok_or_else(|| {
            ProcbindError::Connection(format!("no connection pool bound to name {}", name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pools.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("names", &self.names())
            .finish()
    }
}
