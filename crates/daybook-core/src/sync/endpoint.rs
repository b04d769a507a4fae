//! Server side of the sync exchange, shared by the HTTP API and in-process transports.

use crate::services::JournalService;
use crate::{Error, Result};

use super::protocol::{PullRequest, PullResponse, PushRequest, PushResponse, SyncRequest, SyncResponse};

/// Answers pull and push requests against a server-side journal.
///
/// Pushes are applied as a blind upsert: the client has already merged by
/// timestamp before deciding what to send.
#[derive(Clone)]
pub struct SyncEndpoint {
    journal: JournalService,
}

impl SyncEndpoint {
    pub const fn new(journal: JournalService) -> Self {
        Self { journal }
    }

    pub const fn journal(&self) -> &JournalService {
        &self.journal
    }

    pub async fn handle(&self, request: SyncRequest) -> Result<SyncResponse> {
        match request {
            SyncRequest::Pull(pull) => self.pull(pull).await.map(SyncResponse::Pull),
            SyncRequest::Push(push) => self.push(push).await.map(SyncResponse::Push),
        }
    }

    /// Every stored entry with `timestamp > last_sync`, or all when absent.
    pub async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        let entries = self.journal.modified_since(request.last_sync).await?;
        tracing::debug!(
            count = entries.len(),
            last_sync = ?request.last_sync.map(|ts| ts.to_iso()),
            "Serving pull"
        );
        Ok(PullResponse { entries })
    }

    /// Upsert one chunk as an atomic batch.
    pub async fn push(&self, request: PushRequest) -> Result<PushResponse> {
        if request.total_chunks > 0 && request.chunk_index >= request.total_chunks {
            return Err(Error::InvalidInput(format!(
                "chunk index {} is out of range for {} chunks",
                request.chunk_index, request.total_chunks
            )));
        }

        self.journal.put_entries(&request.entries).await?;
        tracing::info!(
            count = request.entries.len(),
            chunk = request.chunk_index + 1,
            total = request.total_chunks,
            "Stored pushed chunk"
        );
        Ok(PushResponse {
            success: true,
            count: request.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entry, Timestamp};
    use pretty_assertions::assert_eq;

    fn entry(date: &str, message: &str, millis: i64) -> Entry {
        Entry::new(date.parse().unwrap(), message, Timestamp::from_millis(millis))
    }

    async fn endpoint() -> SyncEndpoint {
        SyncEndpoint::new(JournalService::open_in_memory().await.unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_without_ledger_returns_everything() {
        let endpoint = endpoint().await;
        endpoint
            .journal()
            .put_entries(&[entry("2024-01-01", "a", 10), entry("2024-01-02", "", 20)])
            .await
            .unwrap();

        let response = endpoint.pull(PullRequest::default()).await.unwrap();
        assert_eq!(response.entries.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_boundary_is_exclusive() {
        let endpoint = endpoint().await;
        endpoint
            .journal()
            .put_entries(&[entry("2024-01-01", "a", 10), entry("2024-01-02", "b", 20)])
            .await
            .unwrap();

        let response = endpoint
            .pull(PullRequest {
                last_sync: Some(Timestamp::from_millis(10)),
            })
            .await
            .unwrap();
        assert_eq!(response.entries, vec![entry("2024-01-02", "b", 20)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_is_blind_upsert() {
        let endpoint = endpoint().await;
        endpoint
            .journal()
            .put_entries(&[entry("2024-01-01", "newer on server", 50)])
            .await
            .unwrap();

        let response = endpoint
            .handle(SyncRequest::Push(PushRequest {
                entries: vec![entry("2024-01-01", "older from client", 40)],
                chunk_index: 0,
                total_chunks: 1,
            }))
            .await
            .unwrap();

        assert_eq!(
            response,
            SyncResponse::Push(PushResponse {
                success: true,
                count: 1
            })
        );
        assert_eq!(
            endpoint.journal().all_entries().await.unwrap(),
            vec![entry("2024-01-01", "older from client", 40)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_rejects_out_of_range_chunk_index() {
        let endpoint = endpoint().await;

        let result = endpoint
            .push(PushRequest {
                entries: vec![entry("2024-01-01", "a", 1)],
                chunk_index: 3,
                total_chunks: 3,
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(endpoint.journal().count_entries().await.unwrap(), 0);
    }
}
