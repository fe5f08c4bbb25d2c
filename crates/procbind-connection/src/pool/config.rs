//! Pool sizing and timeout settings

use std::time::Duration;

use procbind_core::{ProcbindError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 600_000;

/// Sizing and lifecycle settings of a [`ConnectionPool`](super::ConnectionPool)
///
/// Every field may be omitted in a configuration file; omitted fields take
/// the values of [`PoolConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections opened by `warm_up`
    min_size: usize,
    /// Upper bound on leased plus idle connections
    max_size: usize,
    acquire_timeout_ms: u64,
    /// Idle connections older than this are closed instead of reused
    idle_timeout_ms: u64,
    /// Connections older than this are closed instead of reused
    max_lifetime_ms: Option<u64>,
}

impl PoolConfig {
    /// Create a pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            max_lifetime_ms: None,
        }
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Check sizes of a configuration that was deserialized rather than built
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ProcbindError::Configuration(
                "pool max_size must be greater than 0".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(ProcbindError::Configuration(format!(
                "pool min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }
}

impl Default for PoolConfig {
    /// One warm connection, at most ten, 30 s acquire and 10 min idle timeouts
    fn default() -> Self {
        Self::new(1, 10)
    }
}
