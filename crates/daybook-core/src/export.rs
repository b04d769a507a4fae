//! Shared journal export and import helpers for CLI and server parity.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::journal::display_date;
use crate::models::{Entry, EntryDate};
use crate::{Error, Result};

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// One validated record of an import document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub date: EntryDate,
    pub message: String,
}

/// Render every entry, tombstones included, as pretty-printed JSON.
pub fn render_json_export(entries: &[Entry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

/// Render live entries as Markdown, one section per date in date order.
#[must_use]
pub fn render_markdown_export(entries: &[Entry]) -> String {
    let mut live = entries
        .iter()
        .filter(|entry| !entry.is_tombstone())
        .collect::<Vec<_>>();
    live.sort_by_key(|entry| entry.date);

    let mut output = String::from("# Journal\n");
    for entry in live {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} ({})", entry.date, display_date(entry.date));
        let _ = writeln!(output);
        output.push_str(entry.message.trim_end());
        output.push('\n');
    }

    output
}

/// Render entries based on selected export format.
pub fn render_entries_export(entries: &[Entry], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Markdown => Ok(render_markdown_export(entries)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, today: EntryDate) -> String {
    format!("daybook-export-{today}.{}", format.extension())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    List(Vec<serde_json::Value>),
    Wrapped { entries: Vec<serde_json::Value> },
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    date: Option<String>,
    message: Option<String>,
}

/// Parse and validate a whole import document before anything is written.
///
/// Accepts either a bare list or `{ "entries": [...] }`. Any record with a
/// missing field, a malformed date or a repeated date rejects the document.
/// Timestamps in the document are ignored.
pub fn parse_import_document(payload: &str) -> Result<Vec<ImportRecord>> {
    let document: ImportDocument = serde_json::from_str(payload).map_err(|error| {
        Error::Import(format!("expected a list of {{date, message}} records: {error}"))
    })?;
    let values = match document {
        ImportDocument::List(values) | ImportDocument::Wrapped { entries: values } => values,
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let position = index + 1;
        let raw: RawRecord = serde_json::from_value(value)
            .map_err(|error| Error::Import(format!("record {position}: {error}")))?;

        let date = raw
            .date
            .ok_or_else(|| Error::Import(format!("record {position}: missing date")))?;
        let date = date.parse::<EntryDate>().map_err(|_| {
            Error::Import(format!(
                "record {position}: date '{date}' must be in YYYY-MM-DD format"
            ))
        })?;
        let message = raw
            .message
            .ok_or_else(|| Error::Import(format!("record {position}: missing message")))?;

        if !seen.insert(date) {
            return Err(Error::Import(format!(
                "record {position}: date {date} appears more than once"
            )));
        }
        records.push(ImportRecord { date, message });
    }

    Ok(records)
}
