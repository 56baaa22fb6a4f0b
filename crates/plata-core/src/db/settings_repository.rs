//! Settings repository implementation
//!
//! A small key-value store used for sync bookkeeping: pending id sets and
//! acknowledged remote id sets, keyed per backend.

use crate::error::Result;
use libsql::Connection;
use std::collections::HashSet;

/// Trait for settings storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Get a setting value, `None` if unset
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a setting value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a setting
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load a set of ids stored as a JSON string array under `key`
    pub async fn id_set(&self, key: &str) -> Result<HashSet<String>> {
        match self.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashSet::new()),
        }
    }

    /// Persist a set of ids as a JSON string array under `key`
    ///
    /// Serialized sorted so the stored value is deterministic.
    pub async fn save_id_set(&self, key: &str, ids: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        let raw = serde_json::to_string(&sorted)?;
        self.set(key, &raw).await
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_unset_returns_none() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());
        assert_eq!(repo.get("missing").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_and_get() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        repo.set("gist_id", "abc123").await.unwrap();
        assert_eq!(repo.get("gist_id").await.unwrap().as_deref(), Some("abc123"));

        repo.set("gist_id", "def456").await.unwrap();
        assert_eq!(repo.get("gist_id").await.unwrap().as_deref(), Some("def456"));

        repo.remove("gist_id").await.unwrap();
        assert_eq!(repo.get("gist_id").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_id_set_round_trip() {
        let db = setup().await;
        let repo = LibSqlSettingsRepository::new(db.connection());

        assert!(repo.id_set("pending:gist").await.unwrap().is_empty());

        let ids: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        repo.save_id_set("pending:gist", &ids).await.unwrap();

        let loaded = repo.id_set("pending:gist").await.unwrap();
        assert_eq!(loaded, ids);
    }
}
