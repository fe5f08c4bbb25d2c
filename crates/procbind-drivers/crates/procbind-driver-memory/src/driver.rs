//! In-memory databases and the driver that opens them

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use procbind_core::{
    Connection, DatabaseDriver, DriverCapabilities, ProcbindError, Result,
    ResultSet, Row,
};

use crate::catalog::{CallContext, Procedure, ProcedureCatalog, ProcedureSignature};
use crate::connection::MemoryConnection;
use crate::journal::Journal;
use crate::store::TableStore;

struct DatabaseInner {
    name: String,
    catalog: RwLock<ProcedureCatalog>,
    committed: Mutex<TableStore>,
    journal: Journal,
    credentials: RwLock<Option<(String, String)>>,
    refuse_connections: AtomicBool,
    next_connection: AtomicU64,
}

/// A named in-memory database: procedures, committed tables and a journal
///
/// Cloning yields another handle to the same database.
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                name: name.into(),
                catalog: RwLock::new(ProcedureCatalog::default()),
                committed: Mutex::new(TableStore::new()),
                journal: Journal::default(),
                credentials: RwLock::new(None),
                refuse_connections: AtomicBool::new(false),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a procedure that accepts any parameter names
    pub fn register_procedure(
        &self,
        name: &str,
        body: impl Fn(&mut CallContext<'_>) -> Result<ResultSet> + Send + Sync + 'static,
    ) {
        self.inner.catalog.write().register(
            name,
            Procedure {
                body: Arc::new(body),
                signature: None,
            },
        );
    }

    /// Register a procedure whose calls are checked against a signature
    pub fn register_with_signature(
        &self,
        name: &str,
        signature: ProcedureSignature,
        body: impl Fn(&mut CallContext<'_>) -> Result<ResultSet> + Send + Sync + 'static,
    ) {
        self.inner.catalog.write().register(
            name,
            Procedure {
                body: Arc::new(body),
                signature: Some(signature),
            },
        );
    }

    pub fn procedure_names(&self) -> Vec<String> {
        self.inner.catalog.read().names()
    }

    pub(crate) fn procedure(&self, name: &str) -> Option<Procedure> {
        self.inner.catalog.read().get(name)
    }

    pub(crate) fn committed(&self) -> &Mutex<TableStore> {
        &self.inner.committed
    }

    /// Committed rows of a table
    pub fn table(&self, table: &str) -> Vec<Row> {
        self.inner.committed.lock().rows(table).to_vec()
    }

    /// Insert committed rows directly, bypassing procedures
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut committed = self.inner.committed.lock();
        for row in rows {
            committed.insert(table, row);
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    /// Require a username and password on connect
    pub fn set_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        *self.inner.credentials.write() = Some((username.into(), password.into()));
    }

    /// Make every further connection attempt fail
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Open a connection (auto-commit on)
    pub fn connect(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<MemoryConnection> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(ProcbindError::Connection(format!(
                "database {} refuses connections",
                self.inner.name
            )));
        }
        if let Some((user, secret)) = self.inner.credentials.read().as_ref() {
            if username != Some(user.as_str()) || password != Some(secret.as_str()) {
                return Err(ProcbindError::Connection(format!(
                    "Login failed for user '{}'",
                    username.unwrap_or_default()
                )));
            }
        }
        let id = self.inner.next_connection.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(database = %self.inner.name, connection = id, "memory connection opened");
        Ok(MemoryConnection::open(id, self.clone()))
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("name", &self.inner.name)
            .field("procedures", &self.procedure_names())
            .finish()
    }
}

/// Driver resolving connection strings to in-memory databases
///
/// The connection string names the database, optionally prefixed with
/// `memory:` or `memory://`. Unknown names create an empty database.
#[derive(Default)]
pub struct MemoryDriver {
    databases: RwLock<HashMap<String, MemoryDatabase>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an existing database reachable under its name
    pub fn attach(&self, database: MemoryDatabase) {
        self.databases
            .write()
            .insert(database.name().to_string(), database);
    }

    /// Builder form of [`MemoryDriver::attach`]
    pub fn with_database(self, database: MemoryDatabase) -> Self {
        self.attach(database);
        self
    }

    /// Database of the given name, created empty if unknown
    pub fn database(&self, name: &str) -> MemoryDatabase {
        if let Some(db) = self.databases.read().get(name) {
            return db.clone();
        }
        self.databases
            .write()
            .entry(name.to_string())
            .or_insert_with(|| MemoryDatabase::new(name))
            .clone()
    }

    pub(crate) fn database_name(connection_string: &str) -> Result<&str> {
        let name = connection_string
            .trim()
            .trim_start_matches("memory://")
            .trim_start_matches("memory:")
            .trim();
        if name.is_empty() {
            return Err(ProcbindError::Connection(
                "memory connection string names no database".to_string(),
            ));
        }
        Ok(name)
    }
}

#[async_trait]
impl DatabaseDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            supports_transactions: true,
            supports_output_parameters: true,
            supports_named_parameters: true,
        }
    }

    fn connection_string_help(&self) -> &'static str {
        "memory:<database name>"
    }

    async fn connect(
        &self,
        connection_string: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Arc<dyn Connection>> {
        let name = Self::database_name(connection_string)?;
        let connection = self.database(name).connect(username, password)?;
        Ok(Arc::new(connection))
    }
}
