//! Database layer for Plata
//!
//! Built on libSQL with versioned migrations. Repositories borrow a
//! [`libsql::Connection`] and expose async trait interfaces.

mod connection;
mod entry_repository;
mod migrations;
mod settings_repository;

pub use connection::Database;
pub use entry_repository::{EntryRepository, LibSqlEntryRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
