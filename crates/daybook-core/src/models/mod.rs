//! Data models for Daybook

mod entry;
mod timestamp;

pub use entry::{Entry, EntryDate};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};
