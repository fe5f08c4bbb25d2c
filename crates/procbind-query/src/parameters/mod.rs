//! Parameter extraction and statement binding
//!
//! Extraction walks a type's [`AttributeMetadata`](procbind_core::AttributeMetadata)
//! and produces one [`Parameter`] per binding, in declaration order. Binding
//! attaches those parameters to a [`CallableStatement`](procbind_core::CallableStatement)
//! by name.
//!
//! # Example
//!
//! ```ignore
//! let parameters = extract_parameters(&customer)?;
//! let mut statement = connection.prepare_call("usp_customer_save").await?;
//! bind_parameters(statement.as_mut(), &parameters)?;
//! statement.execute_update().await?;
//! ```

mod binder;
mod extractor;

pub use binder::{apply_out_values, bind_parameters, read_out_parameters};
pub use extractor::{Parameter, extract_parameters, extract_with};
