//! In-process stored-procedure engine for procbind
//!
//! Procedures are plain closures registered on a [`MemoryDatabase`]. They
//! read their named inputs, write outputs and manipulate a small table store
//! through a [`CallContext`]. Connections honour auto-commit: with it off,
//! every call works on a private copy of the tables that `commit` publishes
//! and `rollback` discards. A commit replaces the committed tables wholesale,
//! so concurrent writers are serialised by their last commit.
//!
//! Every connection-level action is appended to the database [`Journal`],
//! which makes the driver usable as a recording fake in tests.

mod catalog;
mod connection;
mod driver;
mod journal;
mod store;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod driver_tests;

pub use catalog::{CallContext, ProcedureFn, ProcedureSignature};
pub use connection::{MemoryConnection, MemoryStatement};
pub use driver::{MemoryDatabase, MemoryDriver};
pub use journal::{Journal, JournalEvent};
pub use store::TableStore;
