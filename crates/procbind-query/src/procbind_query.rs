//! procbind query - parameter binding and CRUD execution
//!
//! This crate turns bindable entities and filters into named procedure
//! parameters, binds them to callable statements and runs the save, delete,
//! get and list operations with uniform transaction handling.

pub mod executor;
pub mod parameters;
mod response;

pub use executor::CrudExecutor;
pub use parameters::{
    Parameter, apply_out_values, bind_parameters, extract_parameters, extract_with,
    read_out_parameters,
};
pub use response::{EntityResponse, ListResponse, Response, WriteResponse};
