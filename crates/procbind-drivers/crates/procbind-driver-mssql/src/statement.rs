//! Callable statements over a tiberius session

use async_trait::async_trait;
use indexmap::IndexMap;
use procbind_core::{CallableStatement, ProcbindError, Result, ResultSet, SqlType, Value};
use std::sync::Arc;

use crate::batch::{build_call, parameter_name};
use crate::connection::{CallOutcome, Session};

/// A stored-procedure call under construction
///
/// Parameter names compare case-insensitively, as they do on the server.
pub struct MssqlStatement {
    session: Arc<Session>,
    procedure: String,
    inputs: IndexMap<String, Value>,
    outputs: IndexMap<String, SqlType>,
    out_values: IndexMap<String, Value>,
}

impl MssqlStatement {
    pub(crate) fn new(session: Arc<Session>, procedure: &str) -> Self {
        Self {
            session,
            procedure: procedure.to_string(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            out_values: IndexMap::new(),
        }
    }

    fn key(name: &str) -> Result<String> {
        parameter_name(name).map(str::to_lowercase)
    }

    async fn run(&mut self, want_rows: bool) -> Result<CallOutcome> {
        let batch = build_call(&self.procedure, &self.inputs, &self.outputs)?;
        tracing::trace!(procedure = %self.procedure, sql = %batch.sql, "calling procedure");
        let outcome = self.session.call(&batch, want_rows).await?;
        self.out_values = outcome
            .outputs
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.clone()))
            .collect();
        Ok(outcome)
    }
}

#[async_trait]
impl CallableStatement for MssqlStatement {
    fn procedure(&self) -> &str {
        &self.procedure
    }

    fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        let key = Self::key(name)?;
        self.inputs.insert(key, value);
        Ok(())
    }

    fn register_out(&mut self, name: &str, sql_type: SqlType) -> Result<()> {
        let key = Self::key(name)?;
        if !sql_type.is_specified() {
            return Err(ProcbindError::Bind(format!(
                "output parameter {} of {} has no SQL type",
                name, self.procedure
            )));
        }
        self.outputs.insert(key, sql_type);
        Ok(())
    }

    async fn execute_update(&mut self) -> Result<u64> {
        Ok(self.run(false).await?.affected)
    }

    async fn execute_query(&mut self) -> Result<ResultSet> {
        Ok(ResultSet::new(self.run(true).await?.rows))
    }

    fn out_value(&self, name: &str) -> Option<&Value> {
        let key = Self::key(name).ok()?;
        self.out_values.get(&key)
    }
}

impl std::fmt::Debug for MssqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlStatement")
            .field("procedure", &self.procedure)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs)
            .finish()
    }
}
