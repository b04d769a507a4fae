use std::path::Path;

use daybook_core::EntryDate;

use crate::commands::common::open_journal;
use crate::error::CliError;

pub async fn run_delete(date: EntryDate, db_path: &Path) -> Result<(), CliError> {
    let journal = open_journal(db_path).await?;
    if journal.read_entry(&date).await?.is_none() {
        return Err(CliError::EntryNotFound(date.to_string()));
    }

    journal.delete_entry(date).await?;
    println!("{date}");
    Ok(())
}
