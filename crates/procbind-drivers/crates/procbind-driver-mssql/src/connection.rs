//! MS SQL Server connection implementation using tiberius

use async_trait::async_trait;
use procbind_core::{CallableStatement, Connection, ProcbindError, Result, Row, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiberius::{AuthMethod, Client, ColumnData, Config, Row as TiberiusRow, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::batch::{CallBatch, classify_server_error, quote_procedure};
use crate::statement::MssqlStatement;

/// MS SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for ProcbindError {
    fn from(err: MssqlConnectionError) -> Self {
        ProcbindError::Connection(err.to_string())
    }
}

type TdsClient = Client<Compat<TcpStream>>;

/// What a procedure call produced
#[derive(Debug, Default)]
pub(crate) struct CallOutcome {
    pub rows: Vec<Row>,
    pub affected: u64,
    pub outputs: Vec<(String, Value)>,
}

/// State shared between a connection and the statements it prepared
pub(crate) struct Session {
    client: Mutex<Option<TdsClient>>,
    closed: AtomicBool,
    auto_commit: AtomicBool,
    address: String,
}

impl Session {
    async fn simple(&self, sql: &str) -> Result<()> {
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or(MssqlConnectionError::ConnectionClosed)?;
        client
            .simple_query(sql)
            .await
            .map_err(map_tiberius_error)?
            .into_results()
            .await
            .map_err(map_tiberius_error)?;
        Ok(())
    }

    /// Run a call batch; rows are collected only when `want_rows` is set
    #[tracing::instrument(
        skip(self, batch),
        fields(address = %self.address, params = batch.params.len())
    )]
    pub(crate) async fn call(&self, batch: &CallBatch, want_rows: bool) -> Result<CallOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MssqlConnectionError::ConnectionClosed.into());
        }
        let start = std::time::Instant::now();
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or(MssqlConnectionError::ConnectionClosed)?;

        let params = values_to_tiberius_params(&batch.params);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        if !want_rows && batch.outputs.is_empty() {
            let result = client
                .execute(batch.sql.as_str(), &param_refs[..])
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "call failed");
                    map_tiberius_error(e)
                })?;
            let affected = result.rows_affected().iter().sum::<u64>();
            tracing::debug!(
                affected,
                duration_ms = start.elapsed().as_millis() as u64,
                "call completed"
            );
            return Ok(CallOutcome {
                affected,
                ..CallOutcome::default()
            });
        }

        let mut results = client
            .query(batch.sql.as_str(), &param_refs[..])
            .await
            .map_err(map_tiberius_error)?
            .into_results()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "call failed");
                map_tiberius_error(e)
            })?;

        let mut outputs = Vec::with_capacity(batch.outputs.len());
        if !batch.outputs.is_empty() {
            let out_row = results
                .pop()
                .and_then(|set| set.into_iter().next())
                .ok_or_else(|| {
                    ProcbindError::Execution(format!(
                        "no output values returned for {}",
                        batch.outputs.join(", ")
                    ))
                })?;
            for (name, data) in batch.outputs.iter().zip(out_row.into_iter()) {
                outputs.push((name.clone(), column_data_to_value(data)?));
            }
        }

        let mut rows = Vec::new();
        if want_rows {
            if let Some(first) = results.into_iter().next() {
                rows = tiberius_rows_to_rows(first)?;
            }
        }

        tracing::debug!(
            rows = rows.len(),
            outputs = outputs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "call completed"
        );
        Ok(CallOutcome {
            rows,
            affected: 0,
            outputs,
        })
    }
}

/// MS SQL Server connection using tiberius
///
/// Starts in auto-commit mode, which is the server default. Turning
/// auto-commit off switches the session to implicit transactions, so the
/// first call after a commit or rollback opens a new transaction.
pub struct MssqlConnection {
    session: Arc<Session>,
}

impl MssqlConnection {
    /// Connect using an ADO.NET style connection string
    ///
    /// A username given here replaces any credentials in the string.
    #[tracing::instrument(skip(connection_string, password))]
    pub async fn connect(
        connection_string: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        let config = parse_config(connection_string, username, password)?;
        let address = config.get_addr();
        tracing::debug!("connecting to MS SQL Server at {}", address);

        let tcp = TcpStream::connect(&address)
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("successfully connected to MS SQL Server");

        Ok(Self {
            session: Arc::new(Session {
                client: Mutex::new(Some(client)),
                closed: AtomicBool::new(false),
                auto_commit: AtomicBool::new(true),
                address,
            }),
        })
    }

    fn ensure_not_closed(&self) -> std::result::Result<(), MssqlConnectionError> {
        if self.session.closed.load(Ordering::SeqCst) {
            return Err(MssqlConnectionError::ConnectionClosed);
        }
        Ok(())
    }
}

/// Parse a connection string and apply explicit credentials
pub(crate) fn parse_config(
    connection_string: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> std::result::Result<Config, MssqlConnectionError> {
    let mut config = Config::from_ado_string(connection_string)
        .map_err(|e| MssqlConnectionError::InvalidConnectionString(e.to_string()))?;
    if let Some(user) = username {
        config.authentication(AuthMethod::sql_server(user, password.unwrap_or("")));
    }
    Ok(config)
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    async fn prepare_call(&self, procedure: &str) -> Result<Box<dyn CallableStatement>> {
        self.ensure_not_closed()?;
        quote_procedure(procedure)?;
        Ok(Box::new(MssqlStatement::new(
            self.session.clone(),
            procedure.trim(),
        )))
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.ensure_not_closed()?;
        if enabled {
            self.session
                .simple("IF @@TRANCOUNT > 0 COMMIT TRANSACTION; SET IMPLICIT_TRANSACTIONS OFF")
                .await?;
        } else {
            self.session.simple("SET IMPLICIT_TRANSACTIONS ON").await?;
        }
        self.session.auto_commit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.session.auto_commit.load(Ordering::SeqCst)
    }

    async fn commit(&self) -> Result<()> {
        self.ensure_not_closed()?;
        if self.auto_commit() {
            return Err(ProcbindError::Execution(
                "cannot commit while auto-commit is enabled".to_string(),
            ));
        }
        self.session
            .simple("IF @@TRANCOUNT > 0 COMMIT TRANSACTION")
            .await
    }

    async fn rollback(&self) -> Result<()> {
        self.ensure_not_closed()?;
        self.session
            .simple("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
            .await
    }

    async fn close(&self) -> Result<()> {
        if self.session.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let client = self.session.client.lock().await.take();
        if let Some(client) = client {
            if let Err(e) = client.close().await {
                tracing::warn!(error = %e, "error while closing MS SQL Server connection");
            }
        }
        tracing::debug!("MS SQL Server connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::SeqCst)
    }
}

/// Sort a tiberius error into the procbind taxonomy
pub(crate) fn map_tiberius_error(err: tiberius::error::Error) -> ProcbindError {
    use tiberius::error::Error;
    match &err {
        Error::Server(token) => classify_server_error(token.code(), token.message()),
        Error::Io { .. } | Error::Tls(_) | Error::Routing { .. } => {
            ProcbindError::Connection(err.to_string())
        }
        _ => ProcbindError::Execution(err.to_string()),
    }
}

fn tiberius_rows_to_rows(rows: Vec<TiberiusRow>) -> Result<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.into_iter()
        .map(|row| {
            let values = row
                .into_iter()
                .map(column_data_to_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

fn day_zero(year: i32) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| ProcbindError::Mapping(format!("invalid epoch year {}", year)))
}

fn time_from_increments(increments: u64) -> chrono::NaiveTime {
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(
        (increments / 10_000_000) as u32,
        ((increments % 10_000_000) * 100) as u32,
    )
    .unwrap_or_default()
}

/// Convert tiberius ColumnData to a procbind Value
pub(crate) fn column_data_to_value(col_data: ColumnData<'static>) -> Result<Value> {
    match col_data {
        ColumnData::Bit(None)
        | ColumnData::U8(None)
        | ColumnData::I16(None)
        | ColumnData::I32(None)
        | ColumnData::I64(None)
        | ColumnData::F32(None)
        | ColumnData::F64(None)
        | ColumnData::String(None)
        | ColumnData::Guid(None)
        | ColumnData::Binary(None)
        | ColumnData::Numeric(None)
        | ColumnData::DateTime(None)
        | ColumnData::SmallDateTime(None)
        | ColumnData::DateTime2(None)
        | ColumnData::DateTimeOffset(None)
        | ColumnData::Date(None)
        | ColumnData::Time(None)
        | ColumnData::Xml(None) => Ok(Value::Null),
        ColumnData::Bit(Some(v)) => Ok(Value::Bool(v)),
        ColumnData::U8(Some(v)) => Ok(Value::Int16(v as i16)),
        ColumnData::I16(Some(v)) => Ok(Value::Int16(v)),
        ColumnData::I32(Some(v)) => Ok(Value::Int32(v)),
        ColumnData::I64(Some(v)) => Ok(Value::Int64(v)),
        ColumnData::F32(Some(v)) => Ok(Value::Float32(v)),
        ColumnData::F64(Some(v)) => Ok(Value::Float64(v)),
        ColumnData::String(Some(v)) => Ok(Value::String(v.into_owned())),
        ColumnData::Guid(Some(v)) => Ok(Value::Uuid(v)),
        ColumnData::Binary(Some(v)) => Ok(Value::Bytes(v.into_owned())),
        ColumnData::Numeric(Some(v)) => Ok(Value::Decimal(v.to_string())),
        ColumnData::DateTime(Some(v)) => {
            let dt = chrono::NaiveDateTime::new(
                day_zero(1900)? + chrono::Duration::days(v.days() as i64),
                chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (v.seconds_fragments() as f64 / 300.0) as u32,
                    0,
                )
                .unwrap_or_default(),
            );
            Ok(Value::Timestamp(dt))
        }
        ColumnData::SmallDateTime(Some(v)) => {
            let dt = chrono::NaiveDateTime::new(
                day_zero(1900)? + chrono::Duration::days(v.days() as i64),
                chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (v.seconds_fragments() as u32) * 60,
                    0,
                )
                .unwrap_or_default(),
            );
            Ok(Value::Timestamp(dt))
        }
        ColumnData::DateTime2(Some(v)) => {
            let dt = chrono::NaiveDateTime::new(
                day_zero(1)? + chrono::Duration::days(v.date().days() as i64),
                time_from_increments(v.time().increments()),
            );
            Ok(Value::Timestamp(dt))
        }
        ColumnData::DateTimeOffset(Some(v)) => {
            let dt2 = v.datetime2();
            let dt = chrono::NaiveDateTime::new(
                day_zero(1)? + chrono::Duration::days(dt2.date().days() as i64),
                time_from_increments(dt2.time().increments()),
            );
            Ok(Value::Timestamp(dt))
        }
        ColumnData::Date(Some(v)) => Ok(Value::Date(
            day_zero(1)? + chrono::Duration::days(v.days() as i64),
        )),
        ColumnData::Time(Some(v)) => Ok(Value::Time(time_from_increments(v.increments()))),
        ColumnData::Xml(Some(v)) => Ok(Value::String(v.into_owned().into_string())),
    }
}

/// Container for tiberius parameter values
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TiberiusParam {
    /// Untyped NULL, sent as NVARCHAR so the server can convert it
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Timestamp(chrono::NaiveDateTime),
}

impl ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            TiberiusParam::Null => ColumnData::String(None),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::String(v) => {
                ColumnData::String(Some(std::borrow::Cow::Borrowed(v.as_str())))
            }
            TiberiusParam::Bytes(v) => {
                ColumnData::Binary(Some(std::borrow::Cow::Borrowed(v.as_slice())))
            }
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
            TiberiusParam::Date(v) => v.to_sql(),
            TiberiusParam::Time(v) => v.to_sql(),
            TiberiusParam::Timestamp(v) => v.to_sql(),
        }
    }
}

/// Convert procbind Values to tiberius parameters
pub(crate) fn values_to_tiberius_params(values: &[Value]) -> Vec<TiberiusParam> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => TiberiusParam::Null,
            Value::Bool(b) => TiberiusParam::Bool(*b),
            Value::Int16(i) => TiberiusParam::I16(*i),
            Value::Int32(i) => TiberiusParam::I32(*i),
            Value::Int64(i) => TiberiusParam::I64(*i),
            Value::Float32(f) => TiberiusParam::F32(*f),
            Value::Float64(f) => TiberiusParam::F64(*f),
            Value::Decimal(d) => TiberiusParam::String(d.clone()),
            Value::String(s) => TiberiusParam::String(s.clone()),
            Value::Bytes(b) => TiberiusParam::Bytes(b.clone()),
            Value::Uuid(u) => TiberiusParam::Uuid(*u),
            Value::Date(d) => TiberiusParam::Date(*d),
            Value::Time(t) => TiberiusParam::Time(*t),
            Value::Timestamp(ts) => TiberiusParam::Timestamp(*ts),
        })
        .collect()
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("address", &self.session.address)
            .field("auto_commit", &self.auto_commit())
            .field("closed", &self.is_closed())
            .finish()
    }
}
