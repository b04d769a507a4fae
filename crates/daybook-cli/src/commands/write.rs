use std::path::Path;

use daybook_core::EntryDate;

use crate::commands::common::{open_journal, resolve_entry_message};
use crate::error::CliError;

pub async fn run_write(
    date: EntryDate,
    message_parts: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let journal = open_journal(db_path).await?;

    // Editing an existing day starts from its current text
    let existing = journal
        .read_entry(&date)
        .await?
        .map(|entry| entry.message)
        .unwrap_or_default();
    let message = resolve_entry_message(message_parts, &existing)?;

    let entry = journal.save_entry(date, &message).await?;
    println!("{}", entry.date);
    Ok(())
}
