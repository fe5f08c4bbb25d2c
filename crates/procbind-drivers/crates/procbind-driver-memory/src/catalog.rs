//! Registered procedures and the context they run in

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use procbind_core::{FromValue, ParamDirection, ProcbindError, Result, ResultSet, Row, Value};

use crate::store::TableStore;

/// Body of an in-memory stored procedure
pub type ProcedureFn = Arc<dyn Fn(&mut CallContext<'_>) -> Result<ResultSet> + Send + Sync>;

/// Declared parameters of a procedure
///
/// A procedure registered with a signature rejects unknown parameter names
/// and calls that leave a declared input unbound, the way a server checks a
/// call against the procedure definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcedureSignature {
    params: Vec<(String, ParamDirection)>,
}

impl ProcedureSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(self, name: impl Into<String>) -> Self {
        self.param(name, ParamDirection::In)
    }

    pub fn output(self, name: impl Into<String>) -> Self {
        self.param(name, ParamDirection::Out)
    }

    pub fn param(mut self, name: impl Into<String>, direction: ParamDirection) -> Self {
        self.params.push((name.into(), direction));
        self
    }

    /// Direction of a declared parameter (names compare case-insensitively)
    pub fn direction_of(&self, name: &str) -> Option<ParamDirection> {
        self.params
            .iter()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(name))
            .map(|(_, direction)| *direction)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|(_, d)| d.is_input())
            .map(|(n, _)| n.as_str())
    }
}

#[derive(Clone)]
pub(crate) struct Procedure {
    pub(crate) body: ProcedureFn,
    pub(crate) signature: Option<ProcedureSignature>,
}

/// Procedures known to one database, keyed case-insensitively
#[derive(Clone, Default)]
pub(crate) struct ProcedureCatalog {
    procedures: HashMap<String, Procedure>,
}

impl ProcedureCatalog {
    pub(crate) fn register(&mut self, name: &str, procedure: Procedure) {
        self.procedures.insert(name.to_ascii_lowercase(), procedure);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Procedure> {
        self.procedures.get(&name.to_ascii_lowercase()).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.procedures.keys().cloned().collect();
        names.sort();
        names
    }
}

/// What a procedure body sees while it runs
pub struct CallContext<'a> {
    procedure: &'a str,
    inputs: &'a IndexMap<String, Value>,
    outputs: &'a mut IndexMap<String, Value>,
    store: &'a mut TableStore,
    affected: u64,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        procedure: &'a str,
        inputs: &'a IndexMap<String, Value>,
        outputs: &'a mut IndexMap<String, Value>,
        store: &'a mut TableStore,
    ) -> Self {
        Self {
            procedure,
            inputs,
            outputs,
            store,
            affected: 0,
        }
    }

    pub fn procedure(&self) -> &str {
        self.procedure
    }

    /// Bound input value; unbound names read as NULL
    pub fn input(&self, name: &str) -> &Value {
        self.inputs
            .iter()
            .find(|(bound, _)| bound.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
            .unwrap_or(&Value::Null)
    }

    /// Decode a bound input, failing the call on a conversion error
    pub fn arg<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.input(name).clone()).map_err(|e| {
            ProcbindError::Execution(format!(
                "Error converting parameter @{} of {}: {}",
                name,
                self.procedure,
                e.cause()
            ))
        })
    }

    /// Set an output parameter; names the caller did not register are ignored
    pub fn set_out(&mut self, name: &str, value: impl Into<Value>) {
        if let Some((_, slot)) = self
            .outputs
            .iter_mut()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(name))
        {
            *slot = value.into();
        }
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.store.rows(table)
    }

    pub fn select(&self, table: &str, predicate: impl Fn(&Row) -> bool) -> ResultSet {
        ResultSet::new(self.store.select(table, predicate))
    }

    pub fn insert(&mut self, table: &str, row: Row) {
        self.store.insert(table, row);
        self.affected += 1;
    }

    pub fn update_where(
        &mut self,
        table: &str,
        predicate: impl Fn(&Row) -> bool,
        update: impl Fn(&Row) -> Row,
    ) -> u64 {
        let n = self.store.update_where(table, predicate, update);
        self.affected += n;
        n
    }

    pub fn delete_where(&mut self, table: &str, predicate: impl Fn(&Row) -> bool) -> u64 {
        let n = self.store.delete_where(table, predicate);
        self.affected += n;
        n
    }

    /// Rows affected so far by this call
    pub fn affected(&self) -> u64 {
        self.affected
    }
}
