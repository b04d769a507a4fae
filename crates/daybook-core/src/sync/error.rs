//! Transport and protocol failures of a sync exchange.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Sync server rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid sync configuration or payload: {0}")]
    Protocol(String),
    #[error("Sync server unreachable: {0}")]
    Unreachable(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
