//! T-SQL batches emulating named-parameter procedure calls

use indexmap::IndexMap;
use procbind_core::{ProcbindError, Result, SqlType, Value};

/// Server error: "'@x' is not a parameter for procedure"
const NOT_A_PARAMETER: u32 = 8145;
/// Server error: "Procedure expects parameter '@x', which was not supplied"
const PARAMETER_NOT_SUPPLIED: u32 = 201;

/// A call rendered as SQL text plus positional values for `@P1..@Pn`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CallBatch {
    pub sql: String,
    pub params: Vec<Value>,
    /// Output names, in the column order of the trailing SELECT
    pub outputs: Vec<String>,
}

/// Render `EXEC procedure @name = ...` for the given inputs and outputs
///
/// Inputs travel as positional parameters. Each output gets a declared
/// variable, seeded from the input of the same name for in-out parameters,
/// and is selected back after the call.
pub(crate) fn build_call(
    procedure: &str,
    inputs: &IndexMap<String, Value>,
    outputs: &IndexMap<String, SqlType>,
) -> Result<CallBatch> {
    let target = quote_procedure(procedure)?;
    let mut declarations = Vec::with_capacity(outputs.len());
    let mut arguments = Vec::with_capacity(inputs.len() + outputs.len());
    let mut params = Vec::with_capacity(inputs.len());

    for (idx, (name, sql_type)) in outputs.iter().enumerate() {
        let name = parameter_name(name)?;
        let variable = format!("@__out{}", idx + 1);
        let mut declaration = format!("DECLARE {} {}", variable, declared_type(*sql_type, name)?);
        if let Some(value) = inputs.get(name) {
            params.push(value.clone());
            declaration.push_str(&format!(" = @P{}", params.len()));
        }
        declarations.push(declaration);
        arguments.push(format!("@{} = {} OUTPUT", name, variable));
    }

    for (name, value) in inputs {
        let name = parameter_name(name)?;
        if outputs.contains_key(name) {
            continue;
        }
        params.push(value.clone());
        arguments.push(format!("@{} = @P{}", name, params.len()));
    }

    let mut sql = String::new();
    for declaration in &declarations {
        sql.push_str(declaration);
        sql.push_str(";\n");
    }
    sql.push_str("EXEC ");
    sql.push_str(&target);
    if !arguments.is_empty() {
        sql.push(' ');
        sql.push_str(&arguments.join(", "));
    }
    sql.push(';');

    if !outputs.is_empty() {
        let selected: Vec<String> = outputs
            .keys()
            .enumerate()
            .map(|(idx, name)| format!("@__out{} AS [{}]", idx + 1, name.trim_start_matches('@')))
            .collect();
        sql.push_str("\nSELECT ");
        sql.push_str(&selected.join(", "));
        sql.push(';');
    }

    Ok(CallBatch {
        sql,
        params,
        outputs: outputs
            .keys()
            .map(|n| n.trim_start_matches('@').to_string())
            .collect(),
    })
}

/// Bracket-quote each part of a possibly schema-qualified procedure name
pub(crate) fn quote_procedure(procedure: &str) -> Result<String> {
    let procedure = procedure.trim();
    if procedure.is_empty() {
        return Err(ProcbindError::Argument("procedure name is empty".to_string()));
    }
    let parts: Vec<String> = procedure
        .split('.')
        .map(|part| {
            let part = part.trim();
            let bare = part
                .strip_prefix('[')
                .and_then(|p| p.strip_suffix(']'))
                .unwrap_or(part);
            if bare.is_empty() {
                return Err(ProcbindError::Argument(format!(
                    "malformed procedure name {}",
                    procedure
                )));
            }
            Ok(format!("[{}]", bare.replace(']', "]]")))
        })
        .collect::<Result<_>>()?;
    Ok(parts.join("."))
}

/// Validate a parameter name; a leading `@` is accepted and dropped
pub(crate) fn parameter_name(name: &str) -> Result<&str> {
    let bare = name.trim().trim_start_matches('@');
    let valid = !bare.is_empty()
        && bare
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '#');
    if !valid {
        return Err(ProcbindError::Bind(format!("invalid parameter name {:?}", name)));
    }
    Ok(bare)
}

/// T-SQL type used to declare an output variable
pub(crate) fn declared_type(sql_type: SqlType, name: &str) -> Result<&'static str> {
    let declared = match sql_type {
        SqlType::Varchar => "NVARCHAR(MAX)",
        SqlType::Decimal => "DECIMAL(38, 10)",
        SqlType::Bit => "BIT",
        SqlType::SmallInt => "SMALLINT",
        SqlType::Integer => "INT",
        SqlType::BigInt => "BIGINT",
        SqlType::Real => "REAL",
        SqlType::Float => "FLOAT",
        SqlType::VarBinary => "VARBINARY(MAX)",
        SqlType::Date => "DATE",
        SqlType::Time => "TIME",
        SqlType::Timestamp => "DATETIME2",
        SqlType::Unspecified => {
            return Err(ProcbindError::Bind(format!(
                "output parameter @{} has no SQL type",
                name
            )));
        }
    };
    Ok(declared)
}

/// Sort a server error into the procbind taxonomy
pub(crate) fn classify_server_error(code: u32, message: &str) -> ProcbindError {
    match code {
        NOT_A_PARAMETER | PARAMETER_NOT_SUPPLIED => ProcbindError::Bind(message.to_string()),
        _ => ProcbindError::Execution(message.to_string()),
    }
}
