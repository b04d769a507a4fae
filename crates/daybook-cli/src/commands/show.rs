use std::path::Path;

use daybook_core::journal::{catchup_counts, display_date, on_this_day, start_date, CatchupCounts};
use daybook_core::{Entry, EntryDate};
use serde::Serialize;

use crate::commands::common::{entry_preview, open_journal};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DayView {
    pub date: EntryDate,
    pub title: String,
    pub message: Option<String>,
    pub missed_before: usize,
    pub missed_after: usize,
    pub on_this_day: Vec<Entry>,
}

pub fn build_day_view(date: EntryDate, today: EntryDate, entries: &[Entry]) -> DayView {
    let CatchupCounts { previous, next } =
        catchup_counts(date, start_date(entries, today), today, entries);

    DayView {
        date,
        title: display_date(date),
        message: entries
            .iter()
            .find(|entry| entry.date == date && !entry.is_tombstone())
            .map(|entry| entry.message.clone()),
        missed_before: previous,
        missed_after: next,
        on_this_day: on_this_day(date, entries).into_iter().cloned().collect(),
    }
}

pub fn format_day_view(view: &DayView) -> Vec<String> {
    let mut lines = vec![view.title.clone(), String::new()];
    lines.push(
        view.message
            .clone()
            .unwrap_or_else(|| "(nothing written)".to_string()),
    );

    if view.missed_before > 0 || view.missed_after > 0 {
        lines.push(String::new());
        lines.push(format!(
            "Missed days: {} before, {} after",
            view.missed_before, view.missed_after
        ));
    }

    if !view.on_this_day.is_empty() {
        lines.push(String::new());
        lines.push("On this day:".to_string());
        for entry in &view.on_this_day {
            lines.push(format!("  {}  {}", entry.date.year(), entry_preview(entry, 60)));
        }
    }

    lines
}

pub async fn run_show(date: EntryDate, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let journal = open_journal(db_path).await?;
    let entries = journal.live_entries().await?;
    let view = build_day_view(date, EntryDate::today(), &entries);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in format_day_view(&view) {
            println!("{line}");
        }
    }

    Ok(())
}
