//! Binding parameters to callable statements

use procbind_core::{Bindable, CallableStatement, ProcbindError, Result, Value};

use super::Parameter;

/// Attach parameters to a callable statement, in list order
///
/// Inputs (`IN`, `INOUT`) are bound by name; outputs (`OUT`, `INOUT`) are
/// registered by name and SQL type. Every output must carry a specified
/// type, which is checked before the statement is touched. Duplicate names
/// are passed through as-is; the statement keeps the last write.
pub fn bind_parameters(
    statement: &mut dyn CallableStatement,
    parameters: &[Parameter],
) -> Result<()> {
    if let Some(untyped) = parameters
        .iter()
        .find(|p| p.direction.is_output() && !p.sql_type.is_specified())
    {
        return Err(ProcbindError::Bind(format!(
            "{} parameter {} of {} has no SQL type",
            untyped.direction,
            untyped.name,
            statement.procedure()
        )));
    }

    for parameter in parameters {
        if parameter.direction.is_input() {
            statement.set_value(&parameter.name, parameter.value.clone())?;
        }
        if parameter.direction.is_output() {
            statement.register_out(&parameter.name, parameter.sql_type)?;
        }
    }

    tracing::trace!(
        procedure = %statement.procedure(),
        count = parameters.len(),
        "bound parameters"
    );
    Ok(())
}

/// Collect the values of the output parameters after execution
///
/// Outputs the driver did not report come back as NULL.
pub fn read_out_parameters(
    statement: &dyn CallableStatement,
    parameters: &[Parameter],
) -> Vec<(String, Value)> {
    parameters
        .iter()
        .filter(|p| p.direction.is_output())
        .map(|p| {
            let value = statement.out_value(&p.name).cloned().unwrap_or(Value::Null);
            (p.name.clone(), value)
        })
        .collect()
}

/// Write output values back into the attributes they came from
///
/// Values whose binding has no setter are skipped.
pub fn apply_out_values<T: Bindable>(instance: &mut T, values: Vec<(String, Value)>) -> Result<()> {
    let metadata = T::metadata();
    for (name, value) in values {
        match metadata.find(&name) {
            Some(binding) if binding.is_writable() => binding.write(instance, value)?,
            Some(_) => tracing::debug!(parameter = %name, "output has no setter, skipped"),
            None => {
                return Err(ProcbindError::Argument(format!(
                    "{} has no attribute bound to {}",
                    metadata.entity_name(),
                    name
                )));
            }
        }
    }
    Ok(())
}
