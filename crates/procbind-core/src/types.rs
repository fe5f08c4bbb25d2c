//! Core types for procbind

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{ProcbindError, Result};

/// A database value that can be bound to or read from a procedure call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without timezone
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the variant, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Convert into a typed Rust value
    pub fn decode<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

/// SQL type codes, numerically compatible with `java.sql.Types`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Varchar,
    Decimal,
    Bit,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    VarBinary,
    Date,
    Time,
    Timestamp,
    /// No type could be determined (code -1)
    Unspecified,
}

impl SqlType {
    /// Sentinel code for an unspecified type
    pub const UNSPECIFIED_CODE: i32 = -1;

    /// Integer code of this type
    pub fn code(self) -> i32 {
        match self {
            SqlType::Varchar => 12,
            SqlType::Decimal => 3,
            SqlType::Bit => -7,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Real => 7,
            SqlType::Float => 6,
            SqlType::VarBinary => -3,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Unspecified => Self::UNSPECIFIED_CODE,
        }
    }

    /// Look up a type by code. Unknown codes and the sentinel yield `None`.
    pub fn from_code(code: i32) -> Option<SqlType> {
        let sql_type = match code {
            12 => SqlType::Varchar,
            3 => SqlType::Decimal,
            -7 => SqlType::Bit,
            5 => SqlType::SmallInt,
            4 => SqlType::Integer,
            -5 => SqlType::BigInt,
            7 => SqlType::Real,
            6 => SqlType::Float,
            -3 => SqlType::VarBinary,
            91 => SqlType::Date,
            92 => SqlType::Time,
            93 => SqlType::Timestamp,
            _ => return None,
        };
        Some(sql_type)
    }

    /// Infer the SQL type from a runtime value
    ///
    /// Values outside the mapping table (NULL, 16-bit integers, UUIDs)
    /// infer to [`SqlType::Unspecified`].
    pub fn infer(value: &Value) -> SqlType {
        match value {
            Value::String(_) => SqlType::Varchar,
            Value::Decimal(_) => SqlType::Decimal,
            Value::Bool(_) => SqlType::Bit,
            Value::Int32(_) => SqlType::Integer,
            Value::Int64(_) => SqlType::BigInt,
            Value::Float32(_) => SqlType::Real,
            Value::Float64(_) => SqlType::Float,
            Value::Bytes(_) => SqlType::VarBinary,
            Value::Date(_) => SqlType::Date,
            Value::Time(_) => SqlType::Time,
            Value::Timestamp(_) => SqlType::Timestamp,
            Value::Null | Value::Int16(_) | Value::Uuid(_) => SqlType::Unspecified,
        }
    }

    pub fn is_specified(self) -> bool {
        self != SqlType::Unspecified
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::Decimal => "DECIMAL",
            SqlType::Bit => "BIT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Float => "FLOAT",
            SqlType::VarBinary => "VARBINARY",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Unspecified => "UNSPECIFIED",
        };
        f.write_str(name)
    }
}

/// Conversion from a [`Value`] into a Rust type
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> ProcbindError {
    ProcbindError::Mapping(format!(
        "expected {}, found {}",
        expected,
        value.type_name()
    ))
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $label:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch($label, &other)),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool, "bool";
    i16 => Int16, "int16";
    f32 => Float32, "float32";
    String => String, "string";
    Vec<u8> => Bytes, "bytes";
    Uuid => Uuid, "uuid";
    NaiveDate => Date, "date";
    NaiveTime => Time, "time";
    NaiveDateTime => Timestamp, "timestamp";
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int16(v) => Ok(v as i32),
            Value::Int32(v) => Ok(v),
            Value::Int64(v) => i32::try_from(v)
                .map_err(|_| ProcbindError::Mapping(format!("{} overflows int32", v))),
            other => Err(mismatch("int32", &other)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("int64", &value))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(v as f64),
            Value::Float64(v) => Ok(v),
            other => Err(mismatch("float64", &other)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

/// A row from a procedure result set
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names
    columns: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name (case-insensitive, as most servers resolve columns)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Decode a named column, failing if it is absent
    pub fn try_get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get_by_name(name)
            .ok_or_else(|| ProcbindError::Mapping(format!("missing column {}", name)))?;
        T::from_value(value.clone())
            .map_err(|e| ProcbindError::Mapping(format!("column {}: {}", name, e.cause())))
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Convert to a HashMap
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Rows produced by one procedure call, in cursor order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the result has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
