use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use daybook_core::config::SyncSettings;
use daybook_core::services::JournalService;
use daybook_core::sync::{SyncFailure, SyncOutcome};
use daybook_core::{Entry, EntryDate, Timestamp};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub date: String,
    pub preview: String,
    pub message: String,
    pub timestamp: String,
    pub relative_time: String,
}

pub fn entry_to_list_item(entry: &Entry, now: Timestamp) -> EntryListItem {
    EntryListItem {
        date: entry.date.to_string(),
        preview: entry_preview(entry, 60),
        message: entry.message.clone(),
        timestamp: entry.timestamp.to_iso(),
        relative_time: format_relative_time(entry.timestamp, now),
    }
}

pub fn format_entry_lines(entries: &[Entry], now: Timestamp) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let preview = entry_preview(entry, 60);
            let relative_time = format_relative_time(entry.timestamp, now);
            format!("{}  {preview:<60}  {relative_time}", entry.date)
        })
        .collect()
}

pub fn entry_preview(entry: &Entry, max_chars: usize) -> String {
    let first_line = entry.message.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let keep = max_chars.saturating_sub(3);
    let mut preview = collapsed.chars().take(keep).collect::<String>();
    preview.push_str("...");
    preview
}

pub fn format_sync_timestamp(timestamp: Timestamp) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp.as_millis()).map_or_else(
        || timestamp.as_millis().to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp: Timestamp, now: Timestamp) -> String {
    let diff = now.as_millis().saturating_sub(timestamp.as_millis());
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    match &outcome.failure {
        None => format!(
            "Sync completed: pulled {}, pushed {}",
            outcome.pulled, outcome.pushed
        ),
        Some(SyncFailure::Pull(reason)) => format!(
            "Sync incomplete: pull failed ({reason}); pushed {}",
            outcome.pushed
        ),
        Some(failure @ SyncFailure::Push { .. }) => format!(
            "Sync incomplete: pulled {}, pushed {} before {failure}",
            outcome.pulled, outcome.pushed
        ),
    }
}

/// Accepts `today`, `yesterday` or a strict `YYYY-MM-DD` date.
pub fn parse_entry_date(raw: &str) -> Result<EntryDate, CliError> {
    parse_entry_date_from(raw, EntryDate::today())
}

pub fn parse_entry_date_from(raw: &str, today: EntryDate) -> Result<EntryDate, CliError> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .previous()
            .ok_or_else(|| CliError::InvalidDate(trimmed.to_string())),
        _ => trimmed
            .parse::<EntryDate>()
            .map_err(|_| CliError::InvalidDate(trimmed.to_string())),
    }
}

/// Entry text from arguments, then piped stdin, then `$EDITOR` seeded with `initial`.
pub fn resolve_entry_message(message_parts: &[String], initial: &str) -> Result<String, CliError> {
    if let Some(message) = normalize_content(&message_parts.join(" ")) {
        return Ok(message);
    }

    if let Some(message) = read_piped_stdin()? {
        return Ok(message);
    }

    if let Some(message) = capture_editor_input_with_initial(initial)? {
        return Ok(message);
    }

    Err(CliError::EmptyMessage)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    // EDITOR may carry arguments, e.g. `code --wait`
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("daybook-entry-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("DAYBOOK_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path().ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("daybook").join("daybook.db"))
}

pub async fn open_journal(path: &Path) -> Result<JournalService, CliError> {
    Ok(JournalService::open_path(path).await?)
}

/// Environment settings with the `--server-url` flag applied on top.
pub fn load_sync_settings(server_url: Option<String>) -> Result<SyncSettings, CliError> {
    Ok(SyncSettings::from_env()?.with_server_url(server_url)?)
}
