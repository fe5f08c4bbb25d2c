//! Connections and callable statements of the in-memory engine

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use procbind_core::{
    CallableStatement, Connection, ProcbindError, Result, ResultSet, SqlType, Value,
};

use crate::catalog::{CallContext, ProcedureSignature};
use crate::driver::MemoryDatabase;
use crate::journal::JournalEvent;
use crate::store::TableStore;

struct SessionState {
    auto_commit: bool,
    /// Uncommitted copy of the tables, created by the first call of a transaction
    working: Option<TableStore>,
    closed: bool,
}

pub(crate) struct Session {
    id: u64,
    database: MemoryDatabase,
    state: Mutex<SessionState>,
}

impl Session {
    fn record(&self, event: JournalEvent) {
        self.database.journal().record(event);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.lock().closed {
            return Err(ProcbindError::Connection(format!(
                "connection {} is closed",
                self.id
            )));
        }
        Ok(())
    }
}

/// Connection to a [`MemoryDatabase`]
///
/// New connections start in auto-commit mode.
pub struct MemoryConnection {
    session: Arc<Session>,
}

impl MemoryConnection {
    pub(crate) fn open(id: u64, database: MemoryDatabase) -> Self {
        database.journal().record(JournalEvent::Opened { connection: id });
        Self {
            session: Arc::new(Session {
                id,
                database,
                state: Mutex::new(SessionState {
                    auto_commit: true,
                    working: None,
                    closed: false,
                }),
            }),
        }
    }

    /// Journal id of this connection
    pub fn id(&self) -> u64 {
        self.session.id
    }

    /// Whether uncommitted work is pending
    pub fn in_transaction(&self) -> bool {
        self.session.state.lock().working.is_some()
    }

    fn publish(&self, state: &mut SessionState) {
        if let Some(working) = state.working.take() {
            *self.session.database.committed().lock() = working;
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn driver_name(&self) -> &str {
        "memory"
    }

    async fn prepare_call(&self, procedure: &str) -> Result<Box<dyn CallableStatement>> {
        self.session.ensure_open()?;
        self.session.record(JournalEvent::Prepared {
            connection: self.session.id,
            procedure: procedure.to_string(),
        });
        let signature = self
            .session
            .database
            .procedure(procedure)
            .and_then(|p| p.signature);
        Ok(Box::new(MemoryStatement {
            session: Arc::clone(&self.session),
            procedure: procedure.to_string(),
            signature,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }))
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.session.ensure_open()?;
        let mut state = self.session.state.lock();
        if enabled && state.working.is_some() {
            // switching auto-commit on ends the running transaction
            self.publish(&mut state);
            self.session.record(JournalEvent::Committed {
                connection: self.session.id,
            });
        }
        state.auto_commit = enabled;
        self.session.record(JournalEvent::AutoCommit {
            connection: self.session.id,
            enabled,
        });
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.session.state.lock().auto_commit
    }

    async fn commit(&self) -> Result<()> {
        self.session.ensure_open()?;
        let mut state = self.session.state.lock();
        if state.auto_commit {
            return Err(ProcbindError::Execution(
                "cannot commit while auto-commit is enabled".to_string(),
            ));
        }
        self.publish(&mut state);
        self.session.record(JournalEvent::Committed {
            connection: self.session.id,
        });
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.session.ensure_open()?;
        self.session.state.lock().working = None;
        self.session.record(JournalEvent::RolledBack {
            connection: self.session.id,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.session.state.lock();
        if state.closed {
            return Ok(());
        }
        state.working = None;
        state.closed = true;
        self.session.record(JournalEvent::Closed {
            connection: self.session.id,
        });
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.state.lock().closed
    }
}

/// Callable statement bound to one procedure name
pub struct MemoryStatement {
    session: Arc<Session>,
    procedure: String,
    signature: Option<ProcedureSignature>,
    inputs: IndexMap<String, Value>,
    outputs: IndexMap<String, Value>,
}

impl MemoryStatement {
    fn check_declared(&self, name: &str, output: bool) -> Result<()> {
        let Some(signature) = &self.signature else {
            return Ok(());
        };
        match signature.direction_of(name) {
            Some(direction) if output && !direction.is_output() => Err(ProcbindError::Bind(
                format!("parameter @{} of {} is not an output parameter", name, self.procedure),
            )),
            Some(direction) if !output && !direction.is_input() => Err(ProcbindError::Bind(
                format!("parameter @{} of {} is output only", name, self.procedure),
            )),
            Some(_) => Ok(()),
            None => Err(ProcbindError::Bind(format!(
                "{} has no parameter named @{}",
                self.procedure, name
            ))),
        }
    }

    /// Run the procedure body against a scratch copy of the tables
    ///
    /// The copy replaces the transaction's tables only if the body succeeds,
    /// so a failed call leaves earlier work of the transaction intact.
    fn run(&mut self) -> Result<(ResultSet, u64)> {
        self.session.ensure_open()?;
        let procedure = self.session.database.procedure(&self.procedure).ok_or_else(|| {
            ProcbindError::Execution(format!(
                "Could not find stored procedure '{}'",
                self.procedure
            ))
        })?;
        if let Some(signature) = &procedure.signature {
            if let Some(missing) = signature
                .inputs()
                .find(|name| !self.inputs.keys().any(|k| k.eq_ignore_ascii_case(name)))
            {
                return Err(ProcbindError::Bind(format!(
                    "{} expects parameter @{}, which was not supplied",
                    self.procedure, missing
                )));
            }
        }

        for slot in self.outputs.values_mut() {
            *slot = Value::Null;
        }

        let mut state = self.session.state.lock();
        let committed = self.session.database.committed();
        let mut scratch = match &state.working {
            Some(working) => working.clone(),
            None => committed.lock().clone(),
        };

        let mut context =
            CallContext::new(&self.procedure, &self.inputs, &mut self.outputs, &mut scratch);
        let outcome = (procedure.body)(&mut context);
        let affected = context.affected();

        self.session.record(JournalEvent::Executed {
            connection: self.session.id,
            procedure: self.procedure.clone(),
            success: outcome.is_ok(),
        });
        let rows = outcome?;

        if state.auto_commit {
            *committed.lock() = scratch;
        } else {
            state.working = Some(scratch);
        }
        Ok((rows, affected))
    }
}

#[async_trait]
impl CallableStatement for MemoryStatement {
    fn procedure(&self) -> &str {
        &self.procedure
    }

    fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.check_declared(name, false)?;
        self.inputs.insert(name.to_string(), value);
        Ok(())
    }

    fn register_out(&mut self, name: &str, _sql_type: SqlType) -> Result<()> {
        self.check_declared(name, true)?;
        self.outputs.insert(name.to_string(), Value::Null);
        Ok(())
    }

    async fn execute_update(&mut self) -> Result<u64> {
        let (_, affected) = self.run()?;
        Ok(affected)
    }

    async fn execute_query(&mut self) -> Result<ResultSet> {
        let (rows, _) = self.run()?;
        Ok(rows)
    }

    fn out_value(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}
