use std::path::Path;

use daybook_core::Timestamp;

use crate::commands::common::{entry_to_list_item, format_entry_lines, open_journal, EntryListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let journal = open_journal(db_path).await?;
    let mut entries = journal.live_entries().await?;
    entries.truncate(limit);
    let now = Timestamp::now();

    if as_json {
        let json_items = entries
            .iter()
            .map(|entry| entry_to_list_item(entry, now))
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("No entries yet.");
    } else {
        for line in format_entry_lines(&entries, now) {
            println!("{line}");
        }
    }

    Ok(())
}
