//! MS SQL Server driver for procbind
//!
//! Speaks TDS through tiberius. SQL Server has no client-side callable
//! statement, so each call is sent as a batch that declares the output
//! variables, runs `EXEC` with named arguments and selects the outputs back.

mod batch;
mod connection;
mod driver;
mod statement;

#[cfg(test)]
mod batch_tests;
#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod driver_tests;

pub use connection::{MssqlConnection, MssqlConnectionError};
pub use driver::MssqlDriver;
pub use statement::MssqlStatement;
