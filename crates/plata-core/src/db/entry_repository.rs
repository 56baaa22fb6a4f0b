//! Entry repository implementation

use crate::error::{Error, Result};
use crate::models::{Entry, EntryId, EntryKind};
use chrono::NaiveDate;
use libsql::{params, Connection, Row};
use rust_decimal::Decimal;

/// Trait for entry storage operations (async)
#[allow(async_fn_in_trait)]
pub trait EntryRepository {
    /// Insert an entry, or replace the stored row if the id already exists
    async fn upsert(&self, entry: &Entry) -> Result<()>;

    /// Upsert a batch of entries in a single transaction
    async fn upsert_many(&self, entries: &[Entry]) -> Result<()>;

    /// Get an entry by ID
    async fn get(&self, id: &EntryId) -> Result<Option<Entry>>;

    /// List all entries, newest effective date first
    async fn list(&self) -> Result<Vec<Entry>>;

    /// Hard delete an entry
    async fn delete(&self, id: &EntryId) -> Result<()>;

    /// Number of stored entries
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `EntryRepository`
pub struct LibSqlEntryRepository<'a> {
    conn: &'a Connection,
}

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO entries
    (id, type, amount, principal, date, due_date, note, who, category, account, tags, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SELECT_COLUMNS: &str =
    "id, type, amount, principal, date, due_date, note, who, category, account, tags, updated_at";

impl<'a> LibSqlEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &Row) -> Result<Entry> {
        let id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let amount: String = row.get(2)?;
        let principal: Option<String> = row.get(3)?;
        let date: String = row.get(4)?;
        let due_date: Option<String> = row.get(5)?;

        Ok(Entry {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid entry id '{id}'")))?,
            kind: EntryKind::normalize(&kind),
            amount: parse_decimal(&amount)?,
            principal: principal.as_deref().map(parse_decimal).transpose()?,
            date: parse_date(&date)?,
            due_date: due_date.as_deref().map(parse_date).transpose()?,
            note: row.get(6)?,
            who: row.get(7)?,
            category: row.get(8)?,
            account: row.get(9)?,
            tags: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    async fn insert_row(&self, entry: &Entry) -> Result<()> {
        self.conn
            .execute(
                UPSERT_SQL,
                params![
                    entry.id.as_str(),
                    entry.kind.as_str(),
                    entry.amount.to_string(),
                    entry.principal.map(|p| p.to_string()),
                    entry.date.to_string(),
                    entry.due_date.map(|d| d.to_string()),
                    entry.note.as_str(),
                    entry.who.as_str(),
                    entry.category.as_str(),
                    entry.account.as_str(),
                    entry.tags.as_str(),
                    entry.updated_at,
                ],
            )
            .await?;
        Ok(())
    }
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse()
        .map_err(|_| Error::Database(format!("Invalid amount '{s}'")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    s.parse()
        .map_err(|_| Error::Database(format!("Invalid date '{s}'")))
}

impl EntryRepository for LibSqlEntryRepository<'_> {
    async fn upsert(&self, entry: &Entry) -> Result<()> {
        self.insert_row(entry).await
    }

    async fn upsert_many(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        for entry in entries {
            if let Err(e) = self.insert_row(entry).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM entries WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Entry>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM entries
                     ORDER BY date DESC, updated_at DESC, id"
                ),
                (),
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn delete(&self, id: &EntryId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?", [id.as_str()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM entries", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
