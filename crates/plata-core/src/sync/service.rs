//! Sync service
//!
//! Owns the database handle and one remote backend, and keeps the backend's
//! bookkeeping in the settings table:
//! - `pending_ids:<backend>`: ids pushed but not yet observed in a pull;
//! - `remote_ids:<backend>`: ids the backend's last snapshot contained
//!   (plus ids pushed since, so a burst of edits is not double-pushed);
//! - `last_sync:<backend>`: epoch ms of the last successful pull.

use crate::db::{
    Database, EntryRepository, LibSqlEntryRepository, LibSqlSettingsRepository, SettingsRepository,
};
use crate::error::Result;
use crate::models::{now_ms, EntryId};
use crate::remote::{EntryRemote, PushMode};
use crate::sync::merge;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reconciliation service for one remote backend
pub struct SyncService {
    db: Arc<Database>,
    remote: Box<dyn EntryRemote>,
    pull_generation: AtomicU64,
}

impl SyncService {
    /// Create a service for the given database and backend
    pub fn new(db: Arc<Database>, remote: Box<dyn EntryRemote>) -> Self {
        Self {
            db,
            remote,
            pull_generation: AtomicU64::new(0),
        }
    }

    /// Backend key for this service
    pub fn backend(&self) -> &str {
        self.remote.name()
    }

    fn pending_key(&self) -> String {
        format!("pending_ids:{}", self.remote.name())
    }

    fn acknowledged_key(&self) -> String {
        format!("remote_ids:{}", self.remote.name())
    }

    fn last_sync_key(&self) -> String {
        format!("last_sync:{}", self.remote.name())
    }

    /// Pull the remote snapshot, merge it into the local store, and settle
    /// pending ids observed in the snapshot.
    ///
    /// Returns the merged entry count, or `None` when the pull was
    /// superseded by a newer one and discarded. A failed pull leaves the
    /// store and the pending set untouched.
    pub async fn pull_and_merge(&self) -> Result<Option<usize>> {
        let generation = self.pull_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.remote.pull().await?;
        if self.pull_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(backend = self.remote.name(), "Discarding stale pull");
            return Ok(None);
        }

        let conn = self.db.connection();
        let entries = LibSqlEntryRepository::new(conn);
        let settings = LibSqlSettingsRepository::new(conn);

        let local = entries.list().await?;
        let pending_raw = settings.id_set(&self.pending_key()).await?;
        let pending: HashSet<EntryId> = pending_raw
            .iter()
            .filter_map(|id| id.parse().ok())
            .collect();

        let merged = merge(&local, &snapshot, &pending);
        entries.upsert_many(&merged).await?;

        // Ids seen in the snapshot are settled: no longer pending, known remote
        let snapshot_ids: HashSet<String> = snapshot.iter().map(|e| e.id.as_str()).collect();
        let still_pending: HashSet<String> =
            pending_raw.difference(&snapshot_ids).cloned().collect();
        settings
            .save_id_set(&self.pending_key(), &still_pending)
            .await?;

        // The snapshot is the authority on what the backend holds. Replacing
        // the acknowledged set wholesale means an id the backend lost falls
        // out of it, so the next push re-sends that entry.
        settings
            .save_id_set(&self.acknowledged_key(), &snapshot_ids)
            .await?;

        settings
            .set(&self.last_sync_key(), &now_ms().to_string())
            .await?;

        tracing::info!(
            backend = self.remote.name(),
            merged = merged.len(),
            "Pulled and merged remote snapshot"
        );
        Ok(Some(merged.len()))
    }

    /// Push the full local list, replacing the remote snapshot.
    ///
    /// Returns the number of pushed entries.
    pub async fn push_all(&self) -> Result<usize> {
        let conn = self.db.connection();
        let entries = LibSqlEntryRepository::new(conn);

        let local = entries.list().await?;
        self.remote.push(&local, PushMode::ReplaceAll).await?;
        self.mark_pushed(local.iter().map(|e| e.id.as_str())).await?;

        tracing::info!(
            backend = self.remote.name(),
            pushed = local.len(),
            "Pushed full snapshot"
        );
        Ok(local.len())
    }

    /// Append-push entries the backend has not acknowledged yet.
    ///
    /// Returns the number of pushed entries (0 when nothing was due). A
    /// failed push leaves the pending set untouched.
    pub async fn push_unacknowledged(&self) -> Result<usize> {
        let conn = self.db.connection();
        let entries = LibSqlEntryRepository::new(conn);
        let settings = LibSqlSettingsRepository::new(conn);

        let local = entries.list().await?;
        let acknowledged = settings.id_set(&self.acknowledged_key()).await?;
        let to_push: Vec<_> = local
            .into_iter()
            .filter(|e| !acknowledged.contains(&e.id.as_str()))
            .collect();

        if to_push.is_empty() {
            return Ok(0);
        }

        self.remote.push(&to_push, PushMode::Append).await?;
        self.mark_pushed(to_push.iter().map(|e| e.id.as_str())).await?;

        tracing::info!(
            backend = self.remote.name(),
            pushed = to_push.len(),
            "Pushed unacknowledged entries"
        );
        Ok(to_push.len())
    }

    /// Record pushed ids as acknowledged and pending-until-pulled
    async fn mark_pushed(&self, ids: impl Iterator<Item = String>) -> Result<()> {
        let ids: Vec<String> = ids.collect();
        let settings = LibSqlSettingsRepository::new(self.db.connection());

        let mut pending = settings.id_set(&self.pending_key()).await?;
        pending.extend(ids.iter().cloned());
        settings.save_id_set(&self.pending_key(), &pending).await?;

        let mut acknowledged = settings.id_set(&self.acknowledged_key()).await?;
        acknowledged.extend(ids);
        settings
            .save_id_set(&self.acknowledged_key(), &acknowledged)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entry, EntryKind};
    use crate::sync::testing::MockRemote;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::sync::atomic::Ordering as AtomicOrdering;

    fn sample(amount: i64) -> Entry {
        Entry::new(
            EntryKind::Payment,
            Decimal::from(amount),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    async fn setup(remote: Arc<MockRemote>) -> (Arc<Database>, SyncService) {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let service = SyncService::new(db.clone(), Box::new(remote));
        (db, service)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_merges_remote_into_store() {
        let remote_entry = sample(10);
        let remote = Arc::new(MockRemote::with_entries(vec![remote_entry.clone()]));
        let (db, service) = setup(remote).await;

        let local_entry = sample(20);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&local_entry)
            .await
            .unwrap();

        let merged = service.pull_and_merge().await.unwrap();
        assert_eq!(merged, Some(2));

        let stored = LibSqlEntryRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);

        // The pulled id is now acknowledged
        let acknowledged = LibSqlSettingsRepository::new(db.connection())
            .id_set("remote_ids:mock")
            .await
            .unwrap();
        assert!(acknowledged.contains(&remote_entry.id.as_str()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_pull_leaves_store_untouched() {
        let remote = Arc::new(MockRemote::default());
        remote.fail_pull.store(true, AtomicOrdering::SeqCst);
        let (db, service) = setup(remote).await;

        let local_entry = sample(20);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&local_entry)
            .await
            .unwrap();

        assert!(service.pull_and_merge().await.is_err());

        let stored = LibSqlEntryRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(stored, vec![local_entry]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_unacknowledged_skips_known_ids() {
        let remote = Arc::new(MockRemote::default());
        let (db, service) = setup(remote.clone()).await;

        let known = sample(1);
        let fresh = sample(2);
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.upsert(&known).await.unwrap();
        repo.upsert(&fresh).await.unwrap();

        let acknowledged: std::collections::HashSet<String> =
            [known.id.as_str()].into_iter().collect();
        LibSqlSettingsRepository::new(db.connection())
            .save_id_set("remote_ids:mock", &acknowledged)
            .await
            .unwrap();

        let pushed = service.push_unacknowledged().await.unwrap();
        assert_eq!(pushed, 1);

        let remote_entries = remote.entries.lock().unwrap().clone();
        assert_eq!(remote_entries, vec![fresh.clone()]);

        // The pushed id is pending until a pull shows it back
        let pending = LibSqlSettingsRepository::new(db.connection())
            .id_set("pending_ids:mock")
            .await
            .unwrap();
        assert!(pending.contains(&fresh.id.as_str()));
        assert!(!pending.contains(&known.id.as_str()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_unacknowledged_noop_when_everything_known() {
        let remote = Arc::new(MockRemote::default());
        let (_db, service) = setup(remote.clone()).await;

        let pushed = service.push_unacknowledged().await.unwrap();
        assert_eq!(pushed, 0);
        assert_eq!(remote.push_count.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_push_leaves_pending_untouched() {
        let remote = Arc::new(MockRemote::default());
        remote.fail_push.store(true, AtomicOrdering::SeqCst);
        let (db, service) = setup(remote).await;

        LibSqlEntryRepository::new(db.connection())
            .upsert(&sample(1))
            .await
            .unwrap();

        assert!(service.push_unacknowledged().await.is_err());

        let pending = LibSqlSettingsRepository::new(db.connection())
            .id_set("pending_ids:mock")
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_entry_survives_stale_snapshot() {
        let remote = Arc::new(MockRemote::default());
        let (db, service) = setup(remote.clone()).await;

        let entry = sample(7);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&entry)
            .await
            .unwrap();

        // Push marks the id pending; the remote then "loses" it
        service.push_unacknowledged().await.unwrap();
        remote.entries.lock().unwrap().clear();

        let merged = service.pull_and_merge().await.unwrap();
        assert_eq!(merged, Some(1));

        let stored = LibSqlEntryRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_settles_pending_ids_seen_in_snapshot() {
        let remote = Arc::new(MockRemote::default());
        let (db, service) = setup(remote).await;

        let entry = sample(7);
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.upsert(&entry).await.unwrap();

        service.push_unacknowledged().await.unwrap();
        service.pull_and_merge().await.unwrap();

        let pending = LibSqlSettingsRepository::new(db.connection())
            .id_set("pending_ids:mock")
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lost_push_is_resent_after_next_pull() {
        let remote = Arc::new(MockRemote::default());
        let (db, service) = setup(remote.clone()).await;

        let entry = sample(3);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&entry)
            .await
            .unwrap();

        assert_eq!(service.push_unacknowledged().await.unwrap(), 1);

        // The remote loses the entry before the next pull observes it
        remote.entries.lock().unwrap().clear();
        service.pull_and_merge().await.unwrap();

        let pushed = service.push_unacknowledged().await.unwrap();
        assert_eq!(pushed, 1);
        assert_eq!(remote.entries.lock().unwrap().clone(), vec![entry]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_entry_added_during_pull_survives_merge() {
        let remote = Arc::new(MockRemote::default());
        let (gate, gate_rx) = tokio::sync::oneshot::channel();
        *remote.pull_gate.lock().unwrap() = Some(gate_rx);
        let (db, service) = setup(remote).await;
        let service = Arc::new(service);

        let task = tokio::spawn({
            let service = service.clone();
            async move { service.pull_and_merge().await }
        });

        // A write lands while the scheduled pull is in flight
        let entry = sample(11);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&entry)
            .await
            .unwrap();
        gate.send(()).unwrap();
        task.await.unwrap().unwrap();

        let stored = LibSqlEntryRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_all_replaces_remote() {
        let remote = Arc::new(MockRemote::with_entries(vec![sample(99)]));
        let (db, service) = setup(remote.clone()).await;

        let entry = sample(1);
        LibSqlEntryRepository::new(db.connection())
            .upsert(&entry)
            .await
            .unwrap();

        let pushed = service.push_all().await.unwrap();
        assert_eq!(pushed, 1);

        let remote_entries = remote.entries.lock().unwrap().clone();
        assert_eq!(remote_entries, vec![entry]);
    }
}
