//! Shared journal service wrapper used by clients, the sync engine and the server.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{
    Database, EntryRepository, LedgerRepository, LibSqlEntryRepository, LibSqlLedgerRepository,
};
use crate::export::parse_import_document;
use crate::models::{Clock, Entry, EntryDate, SystemClock, Timestamp};
use crate::sync::resolve;
use crate::Result;

/// Outcome of merging pulled entries into the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Dates whose local value was replaced by a strictly newer pulled value
    pub applied: Vec<EntryDate>,
    /// Pulled entries that lost to an equal-or-newer local value
    pub kept_local: usize,
}

/// Thread-safe service for entry store and ledger operations.
///
/// Every write, whether from a user edit or from a sync merge, goes through
/// the same lock and the same atomic batch primitive.
#[derive(Clone)]
pub struct JournalService {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
    revision: Arc<watch::Sender<u64>>,
    saves_in_flight: Arc<AtomicUsize>,
}

/// Marks a local save as in progress until dropped.
pub struct SaveInFlight(Arc<AtomicUsize>);

impl SaveInFlight {
    fn begin(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for SaveInFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl JournalService {
    fn from_database(db: Database) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            clock: Arc::new(SystemClock::new()),
            revision: Arc::new(revision),
            saves_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open a journal at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening journal database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory journal (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current reading of the service clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Subscribe to local mutation notifications (user saves, deletes, imports).
    ///
    /// Sync merges do not bump the revision.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Whether a user save is currently being written.
    pub fn has_save_in_flight(&self) -> bool {
        self.saves_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Hold the save-in-flight flag until the guard is dropped.
    #[cfg(test)]
    pub fn hold_save(&self) -> SaveInFlight {
        SaveInFlight::begin(&self.saves_in_flight)
    }

    /// Timestamp for a local write: the clock reading, but never at or
    /// below what the store already holds for that date.
    fn stamp_over(&self, existing: Option<&Entry>) -> Timestamp {
        let now = self.clock.now();
        match existing {
            Some(existing) if existing.timestamp >= now => {
                Timestamp::from_millis(existing.timestamp.as_millis() + 1)
            }
            _ => now,
        }
    }

    fn announce_change(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Fetch the stored record for a date, tombstones included.
    pub async fn get_entry(&self, date: &EntryDate) -> Result<Option<Entry>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.get(date).await
    }

    /// Fetch the visible entry for a date; tombstones read as absent.
    pub async fn read_entry(&self, date: &EntryDate) -> Result<Option<Entry>> {
        Ok(self
            .get_entry(date)
            .await?
            .filter(|entry| !entry.is_tombstone()))
    }

    /// Save the message for a date with a fresh timestamp.
    ///
    /// A blank message is stored as a tombstone.
    pub async fn save_entry(&self, date: EntryDate, message: &str) -> Result<Entry> {
        let message = if message.trim().is_empty() {
            ""
        } else {
            message
        };
        self.write_local(date, message).await
    }

    /// Delete the entry for a date by writing a tombstone.
    pub async fn delete_entry(&self, date: EntryDate) -> Result<Entry> {
        self.write_local(date, "").await
    }

    async fn write_local(&self, date: EntryDate, message: &str) -> Result<Entry> {
        let _in_flight = SaveInFlight::begin(&self.saves_in_flight);
        let entry = {
            let db = self.db.lock().await;
            let repo = LibSqlEntryRepository::new(db.connection());

            let existing = repo.get(&date).await?;
            let entry = Entry::new(date, message, self.stamp_over(existing.as_ref()));
            repo.put(&entry).await?;
            entry
        };

        if entry.is_tombstone() {
            tracing::debug!(date = %entry.date, "Deleted entry");
        } else {
            tracing::debug!(date = %entry.date, "Saved entry");
        }
        self.announce_change();
        Ok(entry)
    }

    /// Upsert a batch of entries exactly as given, atomically.
    pub async fn put_entries(&self, entries: &[Entry]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.put_all(entries).await
    }

    /// Merge pulled entries: a pulled entry replaces the local one only when
    /// its timestamp is strictly greater. Winners are written as one batch.
    pub async fn merge_remote(&self, incoming: &[Entry]) -> Result<MergeReport> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());

        let mut winners: Vec<Entry> = Vec::new();
        let mut report = MergeReport::default();
        for pulled in incoming {
            // A later duplicate in the same pull competes with the earlier winner
            let pending = winners.iter().position(|entry| entry.date == pulled.date);
            let local = match pending {
                Some(index) => Some(winners[index].clone()),
                None => repo.get(&pulled.date).await?,
            };

            if std::ptr::eq(resolve(local.as_ref(), pulled), pulled) {
                match pending {
                    Some(index) => winners[index] = pulled.clone(),
                    None => winners.push(pulled.clone()),
                }
            } else {
                report.kept_local += 1;
            }
        }

        repo.put_all(&winners).await?;
        report.applied = winners.into_iter().map(|entry| entry.date).collect();
        Ok(report)
    }

    /// Entries modified strictly after `since`, or every entry when `since` is absent.
    pub async fn modified_since(&self, since: Option<Timestamp>) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        match since {
            Some(since) => repo.all_modified_since(since).await,
            None => repo.all().await,
        }
    }

    /// Every stored entry including tombstones, ordered by date.
    pub async fn all_entries(&self) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.all().await
    }

    /// Visible entries, newest date first.
    pub async fn live_entries(&self) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.list_live().await
    }

    /// Number of stored rows including tombstones.
    pub async fn count_entries(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.count().await
    }

    /// Last successful sync time, if any.
    pub async fn last_sync(&self) -> Result<Option<Timestamp>> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.read().await
    }

    /// Durably advance the ledger. Returns the stored value.
    pub async fn record_sync(&self, timestamp: Timestamp) -> Result<Timestamp> {
        let db = self.db.lock().await;
        let repo = LibSqlLedgerRepository::new(db.connection());
        repo.write(timestamp).await
    }

    /// Number of local entries not yet covered by a successful sync.
    pub async fn unsynced_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let ledger = LibSqlLedgerRepository::new(db.connection()).read().await?;
        let repo = LibSqlEntryRepository::new(db.connection());
        match ledger {
            Some(since) => repo.count_modified_since(since).await,
            None => repo.count().await,
        }
    }

    /// Import a JSON backup. The whole document is validated before anything
    /// is written; every entry gets a fresh timestamp so it syncs out.
    pub async fn import_json(&self, payload: &str) -> Result<usize> {
        let records = parse_import_document(payload)?;
        let _in_flight = SaveInFlight::begin(&self.saves_in_flight);

        let entries = {
            let db = self.db.lock().await;
            let repo = LibSqlEntryRepository::new(db.connection());

            let mut entries = Vec::with_capacity(records.len());
            for record in records {
                let existing = repo.get(&record.date).await?;
                let timestamp = self.stamp_over(existing.as_ref());
                entries.push(Entry::new(record.date, record.message, timestamp));
            }
            repo.put_all(&entries).await?;
            entries
        };

        tracing::info!(count = entries.len(), "Imported entries");
        self.announce_change();
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManualClock;
    use pretty_assertions::assert_eq;

    fn date(raw: &str) -> EntryDate {
        raw.parse().unwrap()
    }

    fn entry(raw_date: &str, message: &str, millis: i64) -> Entry {
        Entry::new(date(raw_date), message, Timestamp::from_millis(millis))
    }

    async fn service_at(millis: i64) -> JournalService {
        JournalService::open_in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::starting_at(millis)))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_read_roundtrip() {
        let service = service_at(1_000).await;

        let saved = service.save_entry(date("2024-01-01"), "hello").await.unwrap();
        assert_eq!(saved.timestamp, Timestamp::from_millis(1_000));

        let read = service.read_entry(&date("2024-01-01")).await.unwrap();
        assert_eq!(read, Some(saved));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_writes_tombstone_that_reads_as_absent() {
        let service = service_at(1_000).await;

        service.save_entry(date("2024-01-01"), "hello").await.unwrap();
        let tombstone = service.delete_entry(date("2024-01-01")).await.unwrap();

        assert!(tombstone.is_tombstone());
        assert_eq!(service.read_entry(&date("2024-01-01")).await.unwrap(), None);
        assert_eq!(
            service.get_entry(&date("2024-01-01")).await.unwrap(),
            Some(tombstone)
        );
        assert!(service.live_entries().await.unwrap().is_empty());
        assert_eq!(service.count_entries().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_save_is_a_delete() {
        let service = service_at(1_000).await;

        let saved = service.save_entry(date("2024-01-01"), "  \n ").await.unwrap();
        assert!(saved.is_tombstone());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_write_never_goes_below_stored_timestamp() {
        let service = service_at(1_000).await;
        service
            .put_entries(&[entry("2024-01-01", "from server", 5_000)])
            .await
            .unwrap();

        let saved = service.save_entry(date("2024-01-01"), "edit").await.unwrap();
        assert_eq!(saved.timestamp, Timestamp::from_millis(5_001));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_never_goes_below_stored_timestamp() {
        let service = service_at(1_000).await;
        service
            .put_entries(&[entry("2024-01-01", "from fast peer", 5_000)])
            .await
            .unwrap();

        let imported = service
            .import_json(r#"[{"date":"2024-01-01","message":"restored"},{"date":"2024-01-02","message":"new"}]"#)
            .await
            .unwrap();
        assert_eq!(imported, 2);

        let restored = service.get_entry(&date("2024-01-01")).await.unwrap().unwrap();
        assert_eq!(restored.message, "restored");
        assert_eq!(restored.timestamp, Timestamp::from_millis(5_001));

        let fresh = service.get_entry(&date("2024-01-02")).await.unwrap().unwrap();
        assert!(fresh.timestamp < Timestamp::from_millis(5_000));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_mutations_bump_revision() {
        let service = service_at(1_000).await;
        let mut changes = service.subscribe_changes();

        service.save_entry(date("2024-01-01"), "one").await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);

        service
            .merge_remote(&[entry("2024-01-02", "pulled", 9_000)])
            .await
            .unwrap();
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn merge_applies_only_strictly_newer() {
        let service = service_at(1_000).await;
        service
            .put_entries(&[
                entry("2024-01-01", "local older", 100),
                entry("2024-01-02", "local newer", 300),
                entry("2024-01-03", "local tie", 200),
            ])
            .await
            .unwrap();

        let report = service
            .merge_remote(&[
                entry("2024-01-01", "remote newer", 200),
                entry("2024-01-02", "remote older", 200),
                entry("2024-01-03", "remote tie", 200),
                entry("2024-01-04", "remote new date", 50),
            ])
            .await
            .unwrap();

        assert_eq!(report.applied, vec![date("2024-01-01"), date("2024-01-04")]);
        assert_eq!(report.kept_local, 2);

        let all = service.all_entries().await.unwrap();
        assert_eq!(
            all,
            vec![
                entry("2024-01-01", "remote newer", 200),
                entry("2024-01-02", "local newer", 300),
                entry("2024-01-03", "local tie", 200),
                entry("2024-01-04", "remote new date", 50),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_remote_tombstone_does_not_clobber_fresh_edit() {
        let service = service_at(1_000).await;
        service
            .put_entries(&[entry("2024-01-01", "fresh edit", 500)])
            .await
            .unwrap();

        service
            .merge_remote(&[entry("2024-01-01", "", 400)])
            .await
            .unwrap();
        assert_eq!(
            service.read_entry(&date("2024-01-01")).await.unwrap(),
            Some(entry("2024-01-01", "fresh edit", 500))
        );

        service
            .merge_remote(&[entry("2024-01-01", "", 600)])
            .await
            .unwrap();
        assert_eq!(service.read_entry(&date("2024-01-01")).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ledger_and_unsynced_count() {
        let service = service_at(1_000).await;
        service.save_entry(date("2024-01-01"), "a").await.unwrap();
        service.save_entry(date("2024-01-02"), "b").await.unwrap();

        assert_eq!(service.last_sync().await.unwrap(), None);
        assert_eq!(service.unsynced_count().await.unwrap(), 2);

        service
            .record_sync(Timestamp::from_millis(1_000))
            .await
            .unwrap();
        assert_eq!(service.unsynced_count().await.unwrap(), 1);
        assert_eq!(
            service.modified_since(Some(Timestamp::from_millis(1_000)))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_rejects_whole_document_on_bad_record() {
        let service = service_at(1_000).await;
        let payload = r#"[
            {"date": "2024-01-01", "message": "ok"},
            {"date": "2024-13-01", "message": "bad month"}
        ]"#;

        assert!(service.import_json(payload).await.is_err());
        assert_eq!(service.count_entries().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn import_stamps_fresh_timestamps() {
        let service = service_at(7_000).await;
        let payload = r#"[
            {"date": "2024-01-01", "message": "one", "timestamp": "2020-01-01T00:00:00.000Z"},
            {"date": "2024-01-02", "message": "two"}
        ]"#;

        let imported = service.import_json(payload).await.unwrap();
        assert_eq!(imported, 2);

        let all = service.all_entries().await.unwrap();
        assert!(all
            .iter()
            .all(|entry| entry.timestamp >= Timestamp::from_millis(7_000)));
    }
}
