//! plata-core - Core library for Plata
//!
//! This crate contains the shared entry model, the reconciliation (merge)
//! logic, the local database layer, and the remote sync adapters used by
//! all Plata interfaces (API server, CLI).

pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod remote;
pub mod report;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Entry, EntryId, EntryKind};
