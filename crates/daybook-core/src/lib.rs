//! daybook-core - Core library for Daybook
//!
//! This crate contains the entry store, the sync ledger, the delta sync
//! protocol and scheduler, and the server-side sync logic shared by the
//! `daybook` CLI and the `daybook-api` server.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod journal;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Entry, EntryDate, Timestamp};
