//! Database layer for Daybook

mod connection;
mod ledger_repository;
mod migrations;
mod repository;

pub use connection::Database;
pub use ledger_repository::{LedgerRepository, LibSqlLedgerRepository};
pub use repository::{EntryRepository, LibSqlEntryRepository};
