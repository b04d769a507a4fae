use std::path::Path;

use daybook_core::sync::{SchedulerState, SyncScheduler};

use crate::commands::common::{format_sync_outcome, load_sync_settings, open_journal};
use crate::commands::sync::http_engine;
use crate::error::CliError;

pub async fn run_watch(server_url: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let settings = load_sync_settings(server_url)?;
    let journal = open_journal(db_path).await?;
    let engine = http_engine(journal, &settings)?;

    let handle = SyncScheduler::new(engine, settings.scheduler).spawn();
    let mut updates = handle.subscribe();
    let mut reported_rounds = 0;
    println!("Watching for changes; press Ctrl-C to stop.");

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            result = &mut interrupted => {
                if let Err(error) = result {
                    tracing::warn!("Failed to listen for Ctrl-C: {error}");
                }
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = updates.borrow_and_update().clone();
                if status.rounds == reported_rounds || status.state != SchedulerState::Idle {
                    continue;
                }
                reported_rounds = status.rounds;

                if let Some(outcome) = &status.last_outcome {
                    println!(
                        "{} (next in {}s)",
                        format_sync_outcome(outcome),
                        status.interval.as_secs()
                    );
                } else if let Some(error) = &status.last_error {
                    println!("Sync round failed: {error}");
                }
            }
        }
    }

    println!("Stopping; waiting for the current round to finish...");
    handle.shutdown().await;
    Ok(())
}
