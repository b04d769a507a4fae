use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use daybook_core::services::JournalService;
use daybook_core::sync::{SyncEndpoint, SyncRequest, SyncResponse};
use daybook_core::{Entry, EntryDate};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    endpoint: SyncEndpoint,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, journal: JournalService) -> Self {
        Self {
            config,
            endpoint: SyncEndpoint::new(journal),
        }
    }

    pub async fn open(config: Arc<AppConfig>) -> Result<Self, daybook_core::Error> {
        let journal = JournalService::open_path(config.db_path.clone()).await?;
        Ok(Self::new(config, journal))
    }

    const fn journal(&self) -> &JournalService {
        self.endpoint.journal()
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/sync", post(sync))
        .route("/entries", get(list_entries))
        .route("/entries/{date}", get(get_entry))
        .route("/export", get(export_entries));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    entries: usize,
}

async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        entries: state.journal().count_entries().await?,
    }))
}

/// Single sync route; the body's `action` field selects pull or push.
async fn sync(State(state): State<AppState>, body: Bytes) -> Result<Json<SyncResponse>, AppError> {
    let request: SyncRequest = serde_json::from_slice(&body)
        .map_err(|error| AppError::bad_request(format!("malformed sync request: {error}")))?;

    let response = state.endpoint.handle(request).await?;
    if let SyncResponse::Pull(pull) = &response {
        tracing::info!(endpoint = "sync", action = "pull", count = pull.entries.len(), "Served pull");
    }
    Ok(Json(response))
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, AppError> {
    Ok(Json(state.journal().live_entries().await?))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Entry>, AppError> {
    let date = date
        .parse::<EntryDate>()
        .map_err(|_| AppError::bad_request("Date must be in YYYY-MM-DD format"))?;

    state
        .journal()
        .read_entry(&date)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no entry for {date}")))
}

async fn export_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, AppError> {
    Ok(Json(state.journal().all_entries().await?))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::http::StatusCode;
    use daybook_core::sync::{PullResponse, PushResponse};
    use daybook_core::Timestamp;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    async fn state() -> AppState {
        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: PathBuf::from(":memory:"),
        });
        AppState::new(config, JournalService::open_in_memory().await.unwrap())
    }

    fn body(value: &serde_json::Value) -> Bytes {
        Bytes::from(serde_json::to_vec(value).unwrap())
    }

    fn entry(date: &str, message: &str, millis: i64) -> Entry {
        Entry::new(date.parse().unwrap(), message, Timestamp::from_millis(millis))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_then_pull_roundtrip() {
        let state = state().await;

        let Json(pushed) = sync(
            State(state.clone()),
            body(&json!({
                "action": "push",
                "entries": [
                    { "date": "2024-01-01", "message": "hello", "timestamp": "2024-01-01T10:00:00.000Z" },
                    { "date": "2024-01-02", "message": "", "timestamp": "2024-01-02T10:00:00.000Z" }
                ],
                "chunkIndex": 0,
                "totalChunks": 1
            })),
        )
        .await
        .unwrap();
        assert_eq!(
            pushed,
            SyncResponse::Push(PushResponse {
                success: true,
                count: 2
            })
        );

        let Json(pulled) = sync(
            State(state.clone()),
            body(&json!({ "action": "pull", "lastSync": "2024-01-01T10:00:00.000Z" })),
        )
        .await
        .unwrap();
        let SyncResponse::Pull(PullResponse { entries }) = pulled else {
            panic!("expected pull response");
        };
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_tombstone());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_sync_body_is_bad_request() {
        let state = state().await;

        for payload in [
            json!({ "action": "merge" }),
            json!({ "action": "push", "entries": [{ "date": "01/02/2024", "message": "x", "timestamp": "2024-01-01T00:00:00.000Z" }] }),
            json!({ "action": "push", "entries": [{ "date": "2024-01-02", "timestamp": "2024-01-01T00:00:00.000Z" }] }),
        ] {
            let error = sync(State(state.clone()), body(&payload)).await.unwrap_err();
            assert_eq!(error.status(), StatusCode::BAD_REQUEST, "{payload}");
        }

        assert_eq!(state.journal().count_entries().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entry_routes_hide_tombstones() {
        let state = state().await;
        state
            .journal()
            .put_entries(&[entry("2024-01-01", "kept", 1), entry("2024-01-02", "", 2)])
            .await
            .unwrap();

        let Json(live) = list_entries(State(state.clone())).await.unwrap();
        assert_eq!(live, vec![entry("2024-01-01", "kept", 1)]);

        let Json(found) = get_entry(State(state.clone()), Path("2024-01-01".to_string()))
            .await
            .unwrap();
        assert_eq!(found.message, "kept");

        let missing = get_entry(State(state.clone()), Path("2024-01-02".to_string()))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = get_entry(State(state.clone()), Path("2024-1-2".to_string()))
            .await
            .unwrap_err();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let Json(all) = export_entries(State(state)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_entry_count() {
        let state = state().await;
        state
            .journal()
            .put_entries(&[entry("2024-01-01", "a", 1)])
            .await
            .unwrap();

        let Json(health) = healthz(State(state)).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.entries, 1);
    }
}
