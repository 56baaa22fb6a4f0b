//! Sync: snapshot reconciliation, service, and scheduler
//!
//! [`merge`] is the pure reconciliation step. [`SyncService`] wires it to
//! the local store and one remote backend, maintaining the backend's
//! pending-id bookkeeping. [`SyncEngine`] schedules the service: debounced
//! pushes on local edits, periodic pulls.

mod engine;
mod merge;
mod service;

pub use engine::{EngineConfig, SyncEngine};
pub use merge::merge;
pub use service::SyncService;
