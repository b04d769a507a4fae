//! Entry repository implementation

use crate::error::{Error, Result};
use crate::models::{Entry, EntryDate, Timestamp};
use libsql::{params, Connection, Row};

const ENTRY_COLUMNS: &str = "date, message, timestamp";

/// Trait for entry storage operations (async)
///
/// The store is a mapping keyed by date. Timestamp ordering is enforced by
/// callers; the store itself always applies the last write it receives.
#[allow(async_fn_in_trait)]
pub trait EntryRepository {
    /// Get the entry (or tombstone) stored for a date
    async fn get(&self, date: &EntryDate) -> Result<Option<Entry>>;

    /// Upsert a single entry
    async fn put(&self, entry: &Entry) -> Result<()>;

    /// Upsert a batch of entries in one transaction; all or nothing
    async fn put_all(&self, entries: &[Entry]) -> Result<()>;

    /// Entries with `timestamp > since`, oldest first
    async fn all_modified_since(&self, since: Timestamp) -> Result<Vec<Entry>>;

    /// Number of entries with `timestamp > since`
    async fn count_modified_since(&self, since: Timestamp) -> Result<usize>;

    /// Every stored entry including tombstones, ordered by date
    async fn all(&self) -> Result<Vec<Entry>>;

    /// Entries that are not tombstones, newest date first
    async fn list_live(&self) -> Result<Vec<Entry>>;

    /// Number of stored rows including tombstones
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `EntryRepository`
pub struct LibSqlEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &Row) -> Result<Entry> {
        let date: String = row.get(0)?;
        let date = date
            .parse::<EntryDate>()
            .map_err(|_| Error::Database(format!("corrupt date key in entries table: {date}")))?;
        Ok(Entry {
            date,
            message: row.get(1)?,
            timestamp: Timestamp::from_millis(row.get(2)?),
        })
    }

    async fn query_entries(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Entry>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn query_count(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<usize> {
        let mut rows = self.conn.query(sql, params).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }

    async fn upsert(&self, entry: &Entry) -> std::result::Result<u64, libsql::Error> {
        self.conn
            .execute(
                "INSERT INTO entries (date, message, timestamp) VALUES (?1, ?2, ?3)
                 ON CONFLICT(date) DO UPDATE SET
                    message = excluded.message,
                    timestamp = excluded.timestamp",
                params![
                    entry.date.as_str(),
                    entry.message.clone(),
                    entry.timestamp.as_millis()
                ],
            )
            .await
    }
}

impl EntryRepository for LibSqlEntryRepository<'_> {
    async fn get(&self, date: &EntryDate) -> Result<Option<Entry>> {
        let entries = self
            .query_entries(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE date = ?1"),
                params![date.as_str()],
            )
            .await?;
        Ok(entries.into_iter().next())
    }

    async fn put(&self, entry: &Entry) -> Result<()> {
        self.put_all(std::slice::from_ref(entry)).await
    }

    async fn put_all(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

        for entry in entries {
            if let Err(e) = self.upsert(entry).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::debug!(count = entries.len(), "Committed entry batch");
        Ok(())
    }

    async fn all_modified_since(&self, since: Timestamp) -> Result<Vec<Entry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE timestamp > ?1
                 ORDER BY timestamp ASC, date ASC"
            ),
            params![since.as_millis()],
        )
        .await
    }

    async fn count_modified_since(&self, since: Timestamp) -> Result<usize> {
        self.query_count(
            "SELECT COUNT(*) FROM entries WHERE timestamp > ?1",
            params![since.as_millis()],
        )
        .await
    }

    async fn all(&self) -> Result<Vec<Entry>> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries ORDER BY date ASC"),
            (),
        )
        .await
    }

    async fn list_live(&self) -> Result<Vec<Entry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE message <> ''
                 ORDER BY date DESC"
            ),
            (),
        )
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.query_count("SELECT COUNT(*) FROM entries", ()).await
    }
}
