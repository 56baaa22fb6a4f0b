//! Domain models for Plata

mod entry;

pub use entry::{debt_installments, now_ms, Entry, EntryId, EntryKind};
