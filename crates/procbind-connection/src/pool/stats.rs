//! Pool statistics

use serde::{Deserialize, Serialize};

/// Snapshot of a pool's occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Idle plus leased connections
    total: usize,
    idle: usize,
    /// Connections currently leased to callers
    leased: usize,
    /// Callers waiting in `acquire`
    waiting: usize,
}

impl PoolStats {
    pub fn new(total: usize, idle: usize, leased: usize, waiting: usize) -> Self {
        Self {
            total,
            idle,
            leased,
            waiting,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn leased(&self) -> usize {
        self.leased
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Share of connections on lease, between 0.0 and 1.0 (0.0 for an empty pool)
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.leased as f64 / self.total as f64
        }
    }

    /// Whether every existing connection is on lease
    pub fn is_exhausted(&self) -> bool {
        self.idle == 0 && self.total > 0
    }
}
