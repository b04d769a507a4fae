//! Offline-first delta sync between a local journal and a server journal.
//!
//! A round pulls everything the server changed since the ledger, merges it by
//! last-write-wins, pushes local changes in chunks and only then advances the
//! ledger. [`SyncScheduler`] decides when rounds run.

mod endpoint;
mod engine;
mod error;
mod merge;
mod protocol;
mod scheduler;
mod transport;

pub use endpoint::SyncEndpoint;
pub use engine::{SyncEngine, SyncFailure, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use merge::{chunk_entries, resolve, DEFAULT_CHUNK_SIZE};
pub use protocol::{
    PullRequest, PullResponse, PushRequest, PushResponse, SyncRequest, SyncResponse,
};
pub use scheduler::{
    Backoff, SchedulerConfig, SchedulerHandle, SchedulerState, SchedulerStatus, SyncScheduler,
    SyncTrigger,
};
pub use transport::{HttpTransport, LoopbackTransport, SyncTransport};
