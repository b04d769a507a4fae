//! Wire types exchanged over `POST /api/sync`.

use serde::{Deserialize, Serialize};

use crate::models::{Entry, Timestamp};

/// One sync request, discriminated by its `action` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SyncRequest {
    Pull(PullRequest),
    Push(PushRequest),
}

/// Ask for every entry modified strictly after `last_sync` (all when absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(default)]
    pub last_sync: Option<Timestamp>,
}

/// One chunk of an outgoing delta. Each chunk is an independent atomic batch;
/// the index and total are informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default = "single_chunk")]
    pub total_chunks: usize,
}

const fn single_chunk() -> usize {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub success: bool,
    #[serde(default)]
    pub count: usize,
}

/// Server reply to a [`SyncRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SyncResponse {
    Pull(PullResponse),
    Push(PushResponse),
}
