//! Read-side journal views shared by clients.
//!
//! All views work on live entries only; tombstones are ignored.

use std::collections::HashSet;

use crate::models::{Entry, EntryDate};

/// Missing days around the date being viewed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchupCounts {
    /// Days without an entry from `start` up to the day before `current`
    pub previous: usize,
    /// Days without an entry from the day after `current` up to `today`
    pub next: usize,
}

/// Human-friendly long form, e.g. `Monday, January 1, 2024`.
#[must_use]
pub fn display_date(date: EntryDate) -> String {
    date.as_naive().format("%A, %B %-d, %Y").to_string()
}

/// Entries written on the same month and day in earlier years, newest year first.
#[must_use]
pub fn on_this_day(current: EntryDate, entries: &[Entry]) -> Vec<&Entry> {
    let mut matches = entries
        .iter()
        .filter(|entry| !entry.is_tombstone())
        .filter(|entry| {
            entry.date.month() == current.month()
                && entry.date.day() == current.day()
                && entry.date.year() < current.year()
        })
        .collect::<Vec<_>>();
    matches.sort_by(|a, b| b.date.cmp(&a.date));
    matches
}

/// The earliest live entry date, or `today` for an empty journal.
#[must_use]
pub fn start_date(entries: &[Entry], today: EntryDate) -> EntryDate {
    entries
        .iter()
        .filter(|entry| !entry.is_tombstone())
        .map(|entry| entry.date)
        .min()
        .unwrap_or(today)
}

/// Count days without an entry before and after `current`.
#[must_use]
pub fn catchup_counts(
    current: EntryDate,
    start: EntryDate,
    today: EntryDate,
    entries: &[Entry],
) -> CatchupCounts {
    let written = entries
        .iter()
        .filter(|entry| !entry.is_tombstone())
        .map(|entry| entry.date)
        .collect::<HashSet<_>>();

    let mut counts = CatchupCounts::default();

    let mut cursor = current.previous();
    while let Some(day) = cursor.filter(|day| *day >= start) {
        if !written.contains(&day) {
            counts.previous += 1;
        }
        cursor = day.previous();
    }

    let mut cursor = current.next();
    while let Some(day) = cursor.filter(|day| *day <= today) {
        if !written.contains(&day) {
            counts.next += 1;
        }
        cursor = day.next();
    }

    counts
}
