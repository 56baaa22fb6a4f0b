//! Snapshot reconciliation
//!
//! Last-writer-wins merge of a local entry set with a remote snapshot,
//! keyed by entry id with `updated_at` as the tie-breaker.

use crate::models::{Entry, EntryId};
use std::collections::{HashMap, HashSet};

/// Merge a remote snapshot into the local entry set.
///
/// Rules:
/// - every id from either side appears exactly once in the result;
/// - when both sides carry an id, the entry with the newer `updated_at`
///   wins, and the remote copy wins exact ties;
/// - local entries absent from the remote snapshot but listed in `pending`
///   keep their local value (they were pushed but the remote has not shown
///   them back yet).
///
/// Pure function: no I/O, inputs are not mutated. Result order is local
/// insertion order followed by remote-only entries in snapshot order.
#[must_use]
pub fn merge(local: &[Entry], remote: &[Entry], pending: &HashSet<EntryId>) -> Vec<Entry> {
    let mut order: Vec<EntryId> = Vec::with_capacity(local.len() + remote.len());
    let mut by_id: HashMap<EntryId, Entry> = HashMap::with_capacity(local.len() + remote.len());

    for entry in local {
        if by_id.insert(entry.id, entry.clone()).is_none() {
            order.push(entry.id);
        }
    }

    let remote_ids: HashSet<EntryId> = remote.iter().map(|e| e.id).collect();

    for entry in remote {
        match by_id.get(&entry.id) {
            None => {
                by_id.insert(entry.id, entry.clone());
                order.push(entry.id);
            }
            Some(existing) if entry.updated_at >= existing.updated_at => {
                by_id.insert(entry.id, entry.clone());
            }
            Some(_) => {}
        }
    }

    // Pending rescue: a pushed-but-unacknowledged local entry must survive a
    // snapshot that predates its push
    for entry in local {
        if pending.contains(&entry.id) && !remote_ids.contains(&entry.id) {
            by_id.insert(entry.id, entry.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}
