//! Sync ledger repository implementation

use crate::error::Result;
use crate::models::Timestamp;
use libsql::{params, Connection};

/// Trait for the single durable "last successful sync" value (async)
#[allow(async_fn_in_trait)]
pub trait LedgerRepository {
    /// Read the last successful sync time; `None` before the first sync
    async fn read(&self) -> Result<Option<Timestamp>>;

    /// Record a successful sync. The ledger never moves backwards; the
    /// value actually stored is returned.
    async fn write(&self, timestamp: Timestamp) -> Result<Timestamp>;
}

/// libSQL implementation of `LedgerRepository`
pub struct LibSqlLedgerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLedgerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl LedgerRepository for LibSqlLedgerRepository<'_> {
    async fn read(&self) -> Result<Option<Timestamp>> {
        let mut rows = self
            .conn
            .query("SELECT last_sync FROM sync_ledger WHERE id = 1", ())
            .await?;

        if let Some(row) = rows.next().await? {
            let millis: i64 = row.get(0)?;
            Ok(Some(Timestamp::from_millis(millis)))
        } else {
            Ok(None)
        }
    }

    async fn write(&self, timestamp: Timestamp) -> Result<Timestamp> {
        self.conn
            .execute(
                "INSERT INTO sync_ledger (id, last_sync) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET
                    last_sync = MAX(last_sync, excluded.last_sync)",
                params![timestamp.as_millis()],
            )
            .await?;

        Ok(self.read().await?.unwrap_or(timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ledger_absent_on_first_run() {
        let db = setup().await;
        let repo = LibSqlLedgerRepository::new(db.connection());

        assert_eq!(repo.read().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ledger_write_and_read() {
        let db = setup().await;
        let repo = LibSqlLedgerRepository::new(db.connection());

        let stored = repo.write(Timestamp::from_millis(1_000)).await.unwrap();
        assert_eq!(stored, Timestamp::from_millis(1_000));
        assert_eq!(
            repo.read().await.unwrap(),
            Some(Timestamp::from_millis(1_000))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ledger_only_moves_forward() {
        let db = setup().await;
        let repo = LibSqlLedgerRepository::new(db.connection());

        repo.write(Timestamp::from_millis(2_000)).await.unwrap();
        let stored = repo.write(Timestamp::from_millis(1_500)).await.unwrap();

        assert_eq!(stored, Timestamp::from_millis(2_000));
        assert_eq!(
            repo.read().await.unwrap(),
            Some(Timestamp::from_millis(2_000))
        );
    }
}
