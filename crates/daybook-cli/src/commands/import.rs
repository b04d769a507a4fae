use std::path::Path;

use crate::commands::common::open_journal;
use crate::error::CliError;

pub async fn run_import(file: &Path, db_path: &Path) -> Result<(), CliError> {
    let payload = std::fs::read_to_string(file)?;
    let journal = open_journal(db_path).await?;

    let imported = journal.import_json(&payload).await?;
    println!("Imported {imported} entries");
    Ok(())
}
