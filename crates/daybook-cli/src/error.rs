use std::io;

use daybook_core::config::ConfigError;
use daybook_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] daybook_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry text provided")]
    EmptyMessage,
    #[error("Invalid date `{0}`: use today, yesterday or YYYY-MM-DD")]
    InvalidDate(String),
    #[error("No entry for {0}")]
    EntryNotFound(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Could not resolve a data directory; pass --db-path or set DAYBOOK_DB_PATH")]
    NoDataDir,
    #[error("Sync did not complete: {0}")]
    SyncIncomplete(String),
}
