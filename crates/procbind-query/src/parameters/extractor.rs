//! Parameter extraction from bindable instances

use procbind_core::{
    AttributeMetadata, Bindable, ParamDirection, ProcbindError, Result, SqlType, Value,
};
use serde::Serialize;

/// One named procedure parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter name as the procedure declares it
    pub name: String,
    /// Bound value (NULL for pure outputs that are unset)
    pub value: Value,
    /// SQL type, declared or inferred from the value
    pub sql_type: SqlType,
    pub direction: ParamDirection,
}

impl Parameter {
    /// An input parameter whose type is inferred from its value
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            sql_type: SqlType::infer(&value),
            value,
            direction: ParamDirection::In,
        }
    }

    pub fn with_direction(mut self, direction: ParamDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Override the inferred type
    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }
}

/// Extract the parameters of an instance through its own metadata
///
/// Returns an empty list for types without bound attributes.
pub fn extract_parameters<T: Bindable>(instance: &T) -> Result<Vec<Parameter>> {
    extract_with(&T::metadata(), instance)
}

/// Extract parameters using metadata the caller already holds
pub fn extract_with<T>(metadata: &AttributeMetadata<T>, instance: &T) -> Result<Vec<Parameter>> {
    metadata.validate()?;

    let mut parameters = Vec::with_capacity(metadata.len());
    for binding in metadata.fields() {
        let value = binding.read(instance).map_err(|e| match e {
            ProcbindError::Access(_) => e,
            other => ProcbindError::Access(format!(
                "cannot read {}.{}: {}",
                metadata.entity_name(),
                binding.field(),
                other.cause()
            )),
        })?;
        let sql_type = binding
            .sql_type()
            .unwrap_or_else(|| SqlType::infer(&value));

        parameters.push(Parameter {
            name: binding.resolved_name().to_string(),
            value,
            sql_type,
            direction: binding.direction(),
        });
    }

    tracing::trace!(
        entity = %metadata.entity_name(),
        count = parameters.len(),
        "extracted parameters"
    );
    Ok(parameters)
}
