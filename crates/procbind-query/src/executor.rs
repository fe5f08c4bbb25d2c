//! CRUD execution over stored procedures
//!
//! Every operation opens one connection through the provider, works on it
//! sequentially and hands it back through `release` on every exit path.
//!
//! Write paths (save, delete, update) run with auto-commit off and commit
//! once for the whole batch. Any failure rolls the batch back; execution
//! failures and output values the entity cannot take then become a failed
//! [`Response`], while connection, binding and metadata failures are
//! returned as `Err`. Read paths
//! switch the connection to auto-commit for the call and turn execution and
//! mapping failures into failed responses.

use std::marker::PhantomData;
use std::sync::Arc;

use procbind_core::{
    Bindable, Connection, ConnectionProvider, EntityList, ProcbindError, ProcedureNames, Result,
    ResultMapper, ResultSet, Value,
};

use crate::parameters::{
    apply_out_values, bind_parameters, extract_parameters, read_out_parameters,
};
use crate::response::{EntityResponse, ListResponse, Response, WriteResponse};

type OutValues = Vec<(String, Value)>;

/// Save/delete/get/list operations for one entity type
pub struct CrudExecutor<E> {
    provider: Arc<dyn ConnectionProvider>,
    procedures: ProcedureNames,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for CrudExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            procedures: self.procedures.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for CrudExecutor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudExecutor")
            .field("provider", &self.provider.describe())
            .field("procedures", &self.procedures)
            .finish()
    }
}

impl<E: Bindable + ResultMapper> CrudExecutor<E> {
    pub fn new(provider: Arc<dyn ConnectionProvider>, procedures: ProcedureNames) -> Self {
        Self {
            provider,
            procedures,
            _entity: PhantomData,
        }
    }

    pub fn procedures(&self) -> &ProcedureNames {
        &self.procedures
    }

    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }

    /// Save one entity through the save procedure
    pub async fn save(&self, entity: &E) -> Result<WriteResponse> {
        self.save_all(std::slice::from_ref(entity)).await
    }

    /// Save a batch atomically: every row commits or none does
    pub async fn save_all(&self, entities: &[E]) -> Result<WriteResponse> {
        let procedure = self.configured("save", &self.procedures.save)?;
        self.write_batch(procedure, entities, |_| Ok(())).await
    }

    /// Save one entity and copy its output parameters back into it
    ///
    /// Output values are applied to a copy before the commit, so a value the
    /// entity cannot take rolls the save back and leaves `entity` untouched.
    pub async fn save_returning(&self, entity: &mut E) -> Result<WriteResponse>
    where
        E: Clone,
    {
        let procedure = self.configured("save", &self.procedures.save)?;
        let mut staged = entity.clone();
        let response = self
            .write_batch(procedure, std::slice::from_ref(&*entity), |outs| {
                match outs.into_iter().next() {
                    Some(values) => apply_out_values(&mut staged, values),
                    None => Ok(()),
                }
            })
            .await?;
        if response.success {
            *entity = staged;
        }
        Ok(response)
    }

    /// Delete one entity through the delete procedure
    pub async fn delete(&self, entity: &E) -> Result<WriteResponse> {
        self.delete_all(std::slice::from_ref(entity)).await
    }

    /// Delete a batch atomically
    pub async fn delete_all(&self, entities: &[E]) -> Result<WriteResponse> {
        let procedure = self.configured("delete", &self.procedures.delete)?;
        self.write_batch(procedure, entities, |_| Ok(())).await
    }

    /// Run the delete procedure once with a filter's parameters
    pub async fn delete_by_filter<F: Bindable>(&self, filter: &F) -> Result<WriteResponse> {
        let procedure = self.configured("delete", &self.procedures.delete)?;
        self.write_batch(procedure, std::slice::from_ref(filter), |_| Ok(()))
            .await
    }

    /// Fetch the single entity selected by a filter
    ///
    /// A result without rows is a failed response.
    pub async fn get<F: Bindable>(&self, filter: &F) -> Result<EntityResponse<E>> {
        let procedure = self.configured("get", &self.procedures.get)?;
        let rows = match self.query(procedure, filter).await? {
            Ok(rows) => rows,
            Err(message) => return Ok(Response::failure(message)),
        };
        let Some(row) = rows.into_iter().next() else {
            let err = ProcbindError::Mapping(format!("no row returned by {}", procedure));
            tracing::debug!(procedure, "get returned no row");
            return Ok(Response::failure(err.to_string()));
        };
        match E::map_one(&row) {
            Ok(entity) => Ok(Response::ok(Some(entity))),
            Err(err) => mapping_failure(procedure, err),
        }
    }

    /// List the entities selected by a filter through the list procedure
    pub async fn list<F: Bindable>(&self, filter: &F) -> Result<ListResponse<E>> {
        let procedure = self.configured("list", &self.procedures.list)?;
        self.select(procedure, filter).await
    }

    /// Run any selection procedure and map every row, in cursor order
    ///
    /// Zero rows give a successful response with an empty list.
    pub async fn execute_selection<F: Bindable>(
        &self,
        filter: &F,
        procedure: &str,
    ) -> Result<ListResponse<E>> {
        self.select(explicit(procedure)?, filter).await
    }

    /// Run any procedure as a single transactional update
    pub async fn execute_update<F: Bindable>(
        &self,
        filter: &F,
        procedure: &str,
    ) -> Result<WriteResponse> {
        self.write_batch(explicit(procedure)?, std::slice::from_ref(filter), |_| Ok(()))
            .await
    }

    #[tracing::instrument(
        skip_all,
        fields(procedure = %procedure, entity = %E::metadata().entity_name())
    )]
    async fn select<F: Bindable>(&self, procedure: &str, filter: &F) -> Result<ListResponse<E>> {
        let rows = match self.query(procedure, filter).await? {
            Ok(rows) => rows,
            Err(message) => return Ok(Response::failure(message)),
        };
        let mut entities = EntityList::with_capacity(rows.row_count());
        for row in rows {
            match E::map_one(&row) {
                Ok(entity) => entities.push(entity),
                Err(err) => return mapping_failure(procedure, err),
            }
        }
        tracing::debug!(procedure, rows = entities.len(), "selection mapped");
        Ok(Response::ok(entities))
    }

    /// Execute a batch of writes in one transaction
    ///
    /// `finish` receives the output values of every row and runs before the
    /// commit; its failure rolls the batch back like a failed row.
    #[tracing::instrument(
        skip_all,
        fields(
            procedure = %procedure,
            entity = %E::metadata().entity_name(),
            rows = items.len()
        )
    )]
    async fn write_batch<T: Bindable>(
        &self,
        procedure: &str,
        items: &[T],
        finish: impl FnOnce(Vec<OutValues>) -> Result<()>,
    ) -> Result<WriteResponse> {
        let connection = self.provider.open().await?;

        let outcome = Self::run_writes(connection.as_ref(), procedure, items, finish).await;
        let response = match outcome {
            Ok(()) => {
                tracing::debug!("batch committed");
                Ok(Response::ok(()))
            }
            Err(err) => {
                if let Err(rollback_err) = connection.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                match err {
                    ProcbindError::Execution(message) => {
                        tracing::warn!(error = %message, "batch rolled back");
                        Ok(Response::failure(message))
                    }
                    err @ ProcbindError::Mapping(_) => {
                        tracing::warn!(error = %err, "output mapping failed, batch rolled back");
                        Ok(Response::failure(err.to_string()))
                    }
                    other => {
                        tracing::warn!(error = %other, "batch aborted");
                        Err(other)
                    }
                }
            }
        };

        self.release(connection).await;
        response
    }

    async fn run_writes<T: Bindable>(
        connection: &dyn Connection,
        procedure: &str,
        items: &[T],
        finish: impl FnOnce(Vec<OutValues>) -> Result<()>,
    ) -> Result<()> {
        let mut outs = Vec::with_capacity(items.len());
        for item in items {
            let parameters = extract_parameters(item)?;
            let mut statement = connection.prepare_call(procedure).await?;
            bind_parameters(statement.as_mut(), &parameters)?;
            let affected = statement.execute_update().await?;
            tracing::trace!(affected, "row written");
            outs.push(read_out_parameters(statement.as_ref(), &parameters));
        }
        finish(outs)?;
        connection.commit().await
    }

    /// Run a selection in auto-commit mode
    ///
    /// The outer `Err` carries hard failures; the inner one the message of a
    /// failed execution.
    #[tracing::instrument(
        skip_all,
        fields(procedure = %procedure, entity = %E::metadata().entity_name())
    )]
    async fn query<F: Bindable>(
        &self,
        procedure: &str,
        filter: &F,
    ) -> Result<std::result::Result<ResultSet, String>> {
        let connection = self.provider.open().await?;

        let outcome = Self::run_query(connection.as_ref(), procedure, filter).await;
        if !connection.is_closed() {
            if let Err(err) = connection.set_auto_commit(false).await {
                tracing::warn!(error = %err, "could not restore manual commit");
            }
        }
        self.release(connection).await;

        match outcome {
            Ok(rows) => Ok(Ok(rows)),
            Err(ProcbindError::Execution(message)) => {
                tracing::warn!(error = %message, "selection failed");
                Ok(Err(message))
            }
            Err(other) => Err(other),
        }
    }

    async fn run_query<F: Bindable>(
        connection: &dyn Connection,
        procedure: &str,
        filter: &F,
    ) -> Result<ResultSet> {
        connection.set_auto_commit(true).await?;
        let parameters = extract_parameters(filter)?;
        let mut statement = connection.prepare_call(procedure).await?;
        bind_parameters(statement.as_mut(), &parameters)?;
        statement.execute_query().await
    }

    async fn release(&self, connection: Arc<dyn Connection>) {
        if let Err(err) = self.provider.release(connection).await {
            tracing::warn!(error = %err, provider = %self.provider.describe(), "release failed");
        }
    }

    fn configured<'a>(&self, role: &str, name: &'a str) -> Result<&'a str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProcbindError::Configuration(format!(
                "no {} procedure configured for {}",
                role,
                E::metadata().entity_name()
            )));
        }
        Ok(name)
    }
}

fn explicit(procedure: &str) -> Result<&str> {
    let name = procedure.trim();
    if name.is_empty() {
        return Err(ProcbindError::Argument("procedure name is empty".to_string()));
    }
    Ok(name)
}

fn mapping_failure<D: Default>(procedure: &str, err: ProcbindError) -> Result<Response<D>> {
    match err {
        ProcbindError::Mapping(_) => {
            tracing::warn!(procedure, error = %err, "row mapping failed");
            Ok(Response::failure(err.to_string()))
        }
        other => Err(other),
    }
}
