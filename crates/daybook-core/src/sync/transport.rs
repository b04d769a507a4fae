//! Transport layer abstraction for sync operations.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::endpoint::SyncEndpoint;
use super::error::{SyncError, SyncResult};
use super::protocol::{PullRequest, PullResponse, PushRequest, PushResponse, SyncRequest};

/// Moves pull and push requests to a sync server.
///
/// Implementations must not impose a timeout shorter than the underlying
/// transport default.
pub trait SyncTransport: Send + Sync {
    fn pull(&self, request: PullRequest)
        -> impl Future<Output = SyncResult<PullResponse>> + Send;

    fn push(&self, request: PushRequest)
        -> impl Future<Output = SyncResult<PushResponse>> + Send;
}

/// JSON over HTTP against `{server}/api/sync`.
#[derive(Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>) -> SyncResult<Self> {
        let base = normalize_text_option(Some(server_url.into())).ok_or_else(|| {
            SyncError::Protocol("server URL must not be empty".to_string())
        })?;
        if !is_http_url(&base) {
            return Err(SyncError::Protocol(
                "server URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            endpoint: format!("{}/api/sync", base.trim_end_matches('/')),
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange<R: DeserializeOwned>(&self, request: &SyncRequest) -> SyncResult<R> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| {
                if error.is_connect() || error.is_timeout() {
                    SyncError::Unreachable(error.to_string())
                } else {
                    SyncError::Http(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        Ok(response.json::<R>().await?)
    }
}

impl SyncTransport for HttpTransport {
    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse> {
        self.exchange(&SyncRequest::Pull(request)).await
    }

    async fn push(&self, request: PushRequest) -> SyncResult<PushResponse> {
        let response: PushResponse = self.exchange(&SyncRequest::Push(request)).await?;
        if response.success {
            Ok(response)
        } else {
            Err(SyncError::Rejected("server reported push failure".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed
    }
}

/// In-process transport that serves requests from a [`SyncEndpoint`].
///
/// Runs the exact server logic without a network hop. Failures and latency can
/// be injected, and every attempted push is recorded by chunk size.
pub struct LoopbackTransport {
    endpoint: SyncEndpoint,
    offline: AtomicBool,
    fail_pull: AtomicBool,
    fail_push_chunk: Mutex<Option<usize>>,
    latency: Mutex<Duration>,
    pulls: AtomicUsize,
    pushes: Mutex<Vec<usize>>,
}

impl LoopbackTransport {
    pub fn new(endpoint: SyncEndpoint) -> Self {
        Self {
            endpoint,
            offline: AtomicBool::new(false),
            fail_pull: AtomicBool::new(false),
            fail_push_chunk: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            pulls: AtomicUsize::new(0),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub const fn endpoint(&self) -> &SyncEndpoint {
        &self.endpoint
    }

    /// Fail every request as unreachable while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    /// Fail every push whose zero-based chunk index equals `chunk`.
    pub fn set_fail_push_chunk(&self, chunk: Option<usize>) {
        *self
            .fail_push_chunk
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = chunk;
    }

    /// Delay every request by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of pull requests received.
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Sizes of every push request received, in arrival order.
    pub fn push_log(&self) -> Vec<usize> {
        self.pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn latency(&self) -> Duration {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::Unreachable("loopback transport is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn record_push(&self, request: &PushRequest) -> bool {
        self.pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.entries.len());
        *self
            .fail_push_chunk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(request.chunk_index)
    }

    async fn delay(&self) {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl SyncTransport for LoopbackTransport {
    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse> {
        self.delay().await;
        self.check_online()?;
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(SyncError::Status {
                status: 500,
                message: "injected pull failure".to_string(),
            });
        }

        self.endpoint
            .pull(request)
            .await
            .map_err(|error| SyncError::Status {
                status: 500,
                message: error.to_string(),
            })
    }

    async fn push(&self, request: PushRequest) -> SyncResult<PushResponse> {
        self.delay().await;
        self.check_online()?;
        if self.record_push(&request) {
            return Err(SyncError::Status {
                status: 503,
                message: format!("injected failure for chunk {}", request.chunk_index),
            });
        }

        self.endpoint
            .push(request)
            .await
            .map_err(|error| SyncError::Status {
                status: 400,
                message: error.to_string(),
            })
    }
}
