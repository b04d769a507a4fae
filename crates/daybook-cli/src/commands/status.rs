use std::path::Path;

use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, load_sync_settings, open_journal};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncStatusReport {
    pub server_url: Option<String>,
    pub last_sync: Option<String>,
    pub entries: usize,
    pub unsynced: usize,
}

impl SyncStatusReport {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!(
                "Server:      {}",
                self.server_url.as_deref().unwrap_or("not configured")
            ),
            format!(
                "Last sync:   {}",
                self.last_sync.as_deref().unwrap_or("never")
            ),
            format!("Entries:     {}", self.entries),
            format!("Unsynced:    {}", self.unsynced),
        ]
    }
}

pub async fn run_status(
    as_json: bool,
    server_url: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let settings = load_sync_settings(server_url)?;
    let journal = open_journal(db_path).await?;

    let report = SyncStatusReport {
        server_url: settings.server_url,
        last_sync: journal.last_sync().await?.map(format_sync_timestamp),
        entries: journal.count_entries().await?,
        unsynced: journal.unsynced_count().await?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
    }

    Ok(())
}
