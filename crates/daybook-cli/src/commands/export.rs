use std::path::{Path, PathBuf};

use daybook_core::export::{render_entries_export, suggested_export_file_name};
use daybook_core::EntryDate;

use crate::cli::ExportFormat;
use crate::commands::common::open_journal;
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let journal = open_journal(db_path).await?;
    let entries = journal.all_entries().await?;
    let rendered = render_entries_export(&entries, format.into())?;

    if let Some(path) = output_path {
        let target = export_target(path, format, EntryDate::today());
        std::fs::write(&target, rendered)?;
        println!("{}", target.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// A directory output gets the default export file name inside it.
pub fn export_target(path: &Path, format: ExportFormat, today: EntryDate) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(format.into(), today))
    } else {
        path.to_path_buf()
    }
}
