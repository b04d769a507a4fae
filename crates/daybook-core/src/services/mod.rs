//! Shared services used by every client and by the server.

mod journal;

pub use journal::{JournalService, MergeReport};
