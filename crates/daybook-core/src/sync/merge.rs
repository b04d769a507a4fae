//! Last-write-wins merge rule and push chunking.

use crate::models::Entry;

/// Default number of entries per push request.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Pick the surviving value for one date.
///
/// The incoming entry wins only with a strictly greater timestamp; ties and
/// older values keep the local entry. An absent local entry always loses.
/// Tombstones follow the same rule as any other value.
#[must_use]
pub fn resolve<'a>(local: Option<&'a Entry>, incoming: &'a Entry) -> &'a Entry {
    match local {
        Some(local) if local.timestamp >= incoming.timestamp => local,
        _ => incoming,
    }
}

/// Split an outgoing delta into ordered chunks of at most `chunk_size`.
pub fn chunk_entries(entries: &[Entry], chunk_size: usize) -> std::slice::Chunks<'_, Entry> {
    entries.chunks(chunk_size.max(1))
}
