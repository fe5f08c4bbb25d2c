//! Connection pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use procbind_core::{Connection, ProcbindError, Result};
use tokio::sync::Semaphore;

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Source of fresh connections for a pool
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Whether an idle connection may be handed out again
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }

    /// Short description for logs
    fn describe(&self) -> String {
        "connection factory".to_string()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A connection together with its age bookkeeping
struct Slot {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
}

impl Slot {
    fn new(connection: Arc<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used_at: now,
        }
    }

    fn holds(&self, connection: &Arc<dyn Connection>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.connection), Arc::as_ptr(connection))
    }
}

/// A bounded pool of connections with manual commit
///
/// A semaphore with `max_size` permits bounds the connections on lease.
/// Each lease holds one permit until the connection is released.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<VecDeque<Slot>>,
    leased: Mutex<Vec<Slot>>,
    semaphore: Arc<Semaphore>,
    waiting_count: AtomicUsize,
}

impl ConnectionPool {
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            leased: Mutex::new(Vec::new()),
            semaphore,
            waiting_count: AtomicUsize::new(0),
        }
    }

    /// Lease a connection with auto-commit disabled
    ///
    /// Reuses a valid idle connection when one exists, otherwise creates a
    /// new one. Waits for a release when `max_size` connections are leased;
    /// waiting longer than the acquire timeout fails with a timeout error.
    pub async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);

        let result = tokio::time::timeout(self.config.acquire_timeout(), async {
            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| ProcbindError::Connection("pool semaphore closed".into()))?;

            let slot = match self.take_idle().await {
                Some(slot) => slot,
                None => Slot::new(self.factory.create().await?),
            };
            Ok((permit, slot))
        })
        .await;

        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        let (permit, mut slot) = match result {
            Ok(Ok(leased)) => leased,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(ProcbindError::Timeout(format!(
                    "timed out waiting for a pooled connection (timeout: {:?})",
                    self.config.acquire_timeout()
                )));
            }
        };

        if slot.connection.auto_commit() {
            if let Err(err) = slot.connection.set_auto_commit(false).await {
                tracing::warn!(error = %err, "could not disable auto-commit, closing connection");
                if let Err(close_err) = slot.connection.close().await {
                    tracing::warn!(error = %close_err, "close after failed lease");
                }
                return Err(err);
            }
        }

        // the permit now belongs to the lease and comes back in `release`
        permit.forget();
        slot.last_used_at = Instant::now();
        let connection = Arc::clone(&slot.connection);
        self.leased.lock().push(slot);
        Ok(connection)
    }

    /// Take back a leased connection
    ///
    /// Closed connections and connections past their lifetime are dropped;
    /// the rest are reset to manual commit and kept idle. Releasing a
    /// connection this pool did not lease is an argument error.
    pub async fn release(&self, connection: Arc<dyn Connection>) -> Result<()> {
        let slot = {
            let mut leased = self.leased.lock();
            let position = leased.iter().position(|slot| slot.holds(&connection));
            position.map(|idx| leased.swap_remove(idx))
        };
        let Some(mut slot) = slot else {
            return Err(ProcbindError::Argument(
                "connection was not leased from this pool".to_string(),
            ));
        };
        self.semaphore.add_permits(1);

        if slot.connection.is_closed() {
            tracing::debug!("dropping closed connection returned to pool");
            return Ok(());
        }
        if self.expired(&slot) {
            return slot.connection.close().await;
        }
        if slot.connection.auto_commit() {
            if let Err(err) = slot.connection.set_auto_commit(false).await {
                tracing::warn!(error = %err, "could not reset returned connection");
                return slot.connection.close().await;
            }
        }

        slot.last_used_at = Instant::now();
        self.idle.lock().push_back(slot);
        Ok(())
    }

    /// Open connections until `min_size` are idle or leased
    pub async fn warm_up(&self) -> Result<()> {
        while self.stats().total() < self.config.min_size() {
            let connection = self.factory.create().await?;
            connection.set_auto_commit(false).await?;
            self.idle.lock().push_back(Slot::new(connection));
        }
        Ok(())
    }

    fn expired(&self, slot: &Slot) -> bool {
        self.config
            .max_lifetime()
            .is_some_and(|max| slot.created_at.elapsed() > max)
    }

    /// Pop the first idle connection that is young and valid, closing stale ones
    async fn take_idle(&self) -> Option<Slot> {
        loop {
            let slot = { self.idle.lock().pop_front() }?;

            let stale = self.expired(&slot)
                || slot.last_used_at.elapsed() > self.config.idle_timeout()
                || !self.factory.validate(&*slot.connection).await;
            if stale {
                let _ = slot.connection.close().await;
                continue;
            }
            return Some(slot);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let leased = self.leased.lock().len();
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle + leased, idle, leased, waiting)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn describe(&self) -> String {
        format!(
            "pool of {} (max {})",
            self.factory.describe(),
            self.config.max_size()
        )
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let slots: Vec<_> = {
            let mut idle = self.idle.lock();
            idle.drain(..).collect()
        };

        for slot in slots {
            let _ = slot.connection.close().await;
        }
    }
}
