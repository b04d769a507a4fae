//! One delta-sync round: pull, merge, push, commit.

use std::collections::HashSet;
use std::fmt;

use crate::models::{Entry, EntryDate};
use crate::services::JournalService;
use crate::Result;

use super::merge::{chunk_entries, DEFAULT_CHUNK_SIZE};
use super::protocol::{PullRequest, PushRequest};
use super::transport::SyncTransport;

/// Why a round did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    Pull(String),
    Push {
        chunk: usize,
        total: usize,
        reason: String,
    },
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull(reason) => write!(f, "pull failed: {reason}"),
            Self::Push {
                chunk,
                total,
                reason,
            } => write!(f, "push chunk {}/{total} failed: {reason}", chunk + 1),
        }
    }
}

/// Result of a completed round. The ledger advanced iff `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    /// Entries received from the server
    pub pulled: usize,
    /// Entries acknowledged by the server
    pub pushed: usize,
    pub failure: Option<SyncFailure>,
}

/// Runs delta-sync rounds for one local journal against one transport.
pub struct SyncEngine<T> {
    journal: JournalService,
    transport: T,
    chunk_size: usize,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub const fn new(journal: JournalService, transport: T) -> Self {
        Self {
            journal,
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub const fn journal(&self) -> &JournalService {
        &self.journal
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Reconcile the local journal with the server.
    ///
    /// Transport failures are reported in the outcome. Only local store
    /// failures are returned as errors.
    pub async fn sync_once(&self) -> Result<SyncOutcome> {
        // Anything written after this reading is strictly newer and will be
        // picked up by the next round.
        let started_at = self.journal.now();
        let last_sync = self.journal.last_sync().await?;
        let local_changes = self.journal.modified_since(last_sync).await?;

        tracing::debug!(
            last_sync = ?last_sync.map(|ts| ts.to_iso()),
            local_changes = local_changes.len(),
            "Starting sync round"
        );

        let (pulled, pull_failure) = match self.transport.pull(PullRequest { last_sync }).await {
            Ok(response) => (response.entries, None),
            Err(error) => {
                tracing::warn!("Sync pull failed: {error}");
                (Vec::new(), Some(SyncFailure::Pull(error.to_string())))
            }
        };

        let report = self.journal.merge_remote(&pulled).await?;
        let overwritten: HashSet<EntryDate> = report.applied.iter().copied().collect();
        let outgoing: Vec<Entry> = local_changes
            .into_iter()
            .filter(|entry| !overwritten.contains(&entry.date))
            .collect();

        let (pushed, push_failure) = self.push_all(&outgoing).await;

        let failure = pull_failure.or(push_failure);
        let success = failure.is_none();
        if success {
            self.journal.record_sync(started_at).await?;
            tracing::info!(
                pulled = pulled.len(),
                applied = report.applied.len(),
                pushed,
                "Sync round complete"
            );
        } else {
            tracing::warn!(
                pulled = pulled.len(),
                pushed,
                "Sync round incomplete; ledger not advanced"
            );
        }

        Ok(SyncOutcome {
            success,
            pulled: pulled.len(),
            pushed,
            failure,
        })
    }

    async fn push_all(&self, outgoing: &[Entry]) -> (usize, Option<SyncFailure>) {
        let total = outgoing.len().div_ceil(self.chunk_size);
        let mut pushed = 0;

        for (index, chunk) in chunk_entries(outgoing, self.chunk_size).enumerate() {
            let request = PushRequest {
                entries: chunk.to_vec(),
                chunk_index: index,
                total_chunks: total,
            };
            match self.transport.push(request).await {
                Ok(_) => {
                    pushed += chunk.len();
                    tracing::debug!(chunk = index + 1, total, "Pushed chunk");
                }
                Err(error) => {
                    tracing::warn!(chunk = index + 1, total, "Sync push failed: {error}");
                    return (
                        pushed,
                        Some(SyncFailure::Push {
                            chunk: index,
                            total,
                            reason: error.to_string(),
                        }),
                    );
                }
            }
        }

        (pushed, None)
    }
}
