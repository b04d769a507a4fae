pub mod common;
pub mod completions;
pub mod delete;
pub mod export;
pub mod import;
pub mod list;
pub mod show;
pub mod status;
pub mod sync;
pub mod watch;
pub mod write;
