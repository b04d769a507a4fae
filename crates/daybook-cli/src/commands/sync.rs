use std::path::Path;

use daybook_core::config::SyncSettings;
use daybook_core::services::JournalService;
use daybook_core::sync::{HttpTransport, SyncEngine, SyncTransport};

use crate::commands::common::{format_sync_outcome, load_sync_settings, open_journal};
use crate::error::CliError;

pub fn http_engine(
    journal: JournalService,
    settings: &SyncSettings,
) -> Result<SyncEngine<HttpTransport>, CliError> {
    let transport = HttpTransport::new(settings.require_server_url()?)?;
    Ok(SyncEngine::new(journal, transport).with_chunk_size(settings.chunk_size))
}

pub async fn run_sync(server_url: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let settings = load_sync_settings(server_url)?;
    let journal = open_journal(db_path).await?;
    let engine = http_engine(journal, &settings)?;
    sync_with(&engine).await
}

/// One round; an incomplete round is reported as an error so scripts see a non-zero exit.
pub async fn sync_with<T: SyncTransport>(engine: &SyncEngine<T>) -> Result<(), CliError> {
    let outcome = engine.sync_once().await?;
    println!("{}", format_sync_outcome(&outcome));

    outcome
        .failure
        .map_or(Ok(()), |failure| Err(CliError::SyncIncomplete(failure.to_string())))
}
