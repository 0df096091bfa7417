//! HTTP and WebSocket interface
//!
//! Thin axum layer over the hub and the query service:
//!
//! - `GET /ws`: live subscription; upgrades and registers a subscriber.
//! - `GET /{series}?page=N`: all records of a series, newest first, 10 per
//!   page.
//! - `POST /{series}`: records inside an inclusive time range, with
//!   optional ledger archival.
//!
//! Validation failures (unknown series, malformed timestamp, unparseable
//! page or body) abort the request with a 400 `{"error": "..."}` body
//! before any store access; store failures map to 500, distinct from
//! "no records found" which is an empty `records` array.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::{self, ArchiveCredentials};
use crate::codec::{SeriesTable, TimeSeriesRecord};
use crate::hub::HubHandle;
use crate::query::QueryService;
use crate::server::BridgeConfig;
use crate::store::StoreError;
use crate::ws;

/// Shared state of the request handlers
#[derive(Clone)]
pub struct ApiState {
    hub: HubHandle,
    query: QueryService,
    series: SeriesTable,
    config: BridgeConfig,
}

impl ApiState {
    /// Bundle the handles the handlers need
    pub fn new(hub: HubHandle, query: QueryService, config: BridgeConfig) -> Self {
        Self {
            hub,
            query,
            series: config.series.clone(),
            config,
        }
    }
}

/// Build the router for the bridge's external interface
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/ws", get(live_subscription))
        .route("/{series}", get(records_by_page).post(records_in_range))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
}

/// Body of the range-query endpoint
#[derive(Debug, Deserialize)]
struct RangeRequest {
    /// Inclusive lower bound, RFC3339
    start: String,
    /// Inclusive upper bound, RFC3339
    end: Option<String>,
    /// 1-indexed page, clamped to >= 1
    page: Option<i64>,
    /// Newest first unless set to false
    #[serde(default = "default_descending")]
    descending: bool,
    /// Optional ledger archival credentials
    archive: Option<ArchiveCredentials>,
}

fn default_descending() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct RecordsResponse {
    records: Vec<TimeSeriesRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive_error: Option<String>,
}

/// Request-scoped error, rendered as `{"error": "..."}`
#[derive(Debug)]
enum ApiError {
    UnknownSeries(String),
    InvalidTimestamp {
        field: &'static str,
        source: chrono::ParseError,
    },
    InvalidRequest(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSeries(name) => {
                (StatusCode::BAD_REQUEST, format!("unknown series {:?}", name))
            }
            ApiError::InvalidTimestamp { field, source } => (
                StatusCode::BAD_REQUEST,
                format!("invalid {} timestamp: {}", field, source),
            ),
            ApiError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(StoreError::UnknownSeries(name)) => {
                (StatusCode::BAD_REQUEST, format!("unknown series {:?}", name))
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn ensure_known(series: &SeriesTable, name: &str) -> Result<(), ApiError> {
    if series.contains(name) {
        Ok(())
    } else {
        Err(ApiError::UnknownSeries(name.to_string()))
    }
}

fn parse_rfc3339(field: &'static str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| ApiError::InvalidTimestamp { field, source })
}

async fn live_subscription(
    State(state): State<ApiState>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    let config = state.config.clone();

    upgrade.on_upgrade(move |socket| async move {
        match hub.register(config.subscriber_queue_capacity).await {
            Ok(session) => {
                ws::serve_subscriber(
                    socket,
                    hub,
                    session,
                    config.keepalive_interval,
                    config.subscriber_idle_timeout,
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Subscriber registration failed");
            }
        }
    })
}

async fn records_by_page(
    State(state): State<ApiState>,
    Path(series): Path<String>,
    params: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let Query(params) = params?;
    ensure_known(&state.series, &series)?;

    let records = state
        .query
        .records_by_page(&series, params.page.unwrap_or(1))
        .await?;

    Ok(Json(RecordsResponse {
        records,
        archive_error: None,
    }))
}

async fn records_in_range(
    State(state): State<ApiState>,
    Path(series): Path<String>,
    request: Result<Json<RangeRequest>, JsonRejection>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let Json(request) = request?;
    ensure_known(&state.series, &series)?;

    let start = parse_rfc3339("start", &request.start)?;
    let end = request
        .end
        .as_deref()
        .map(|v| parse_rfc3339("end", v))
        .transpose()?;

    let records = state
        .query
        .records_in_range(
            &series,
            start,
            end,
            request.page.unwrap_or(1),
            request.descending,
        )
        .await?;

    // Archival failure is reported but never invalidates the records
    // already computed.
    let archive_error = match &request.archive {
        Some(credentials) if !records.is_empty() => {
            archive::submit_records(credentials, &records)
                .await
                .err()
                .map(|e| {
                    tracing::warn!(error = %e, "Archival side effect failed");
                    e.to_string()
                })
        }
        _ => None,
    };

    Ok(Json(RecordsResponse {
        records,
        archive_error,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::hub::FanoutHub;
    use crate::store::{MemoryStore, RecordStore};

    async fn test_router(record_count: u32) -> Router {
        let store = Arc::new(MemoryStore::new(&SeriesTable::default()));
        for minute in 0..record_count {
            store
                .insert(
                    "temperature",
                    TimeSeriesRecord {
                        payload: minute as f64,
                        timestamp: Utc.with_ymd_and_hms(2022, 1, 1, 0, minute, 0).unwrap(),
                    },
                )
                .await
                .unwrap();
        }

        let (_hub, handle) = FanoutHub::new(8);
        let state = ApiState::new(
            handle,
            QueryService::new(store),
            BridgeConfig::default(),
        );
        router(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_by_page_newest_first() {
        let app = test_router(15).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/temperature?page=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0]["payload"], 14.0);
    }

    #[tokio::test]
    async fn test_page_zero_clamped_not_an_error() {
        let app = test_router(15).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/temperature?page=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["records"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_empty_series_serializes_empty_array() {
        let app = test_router(0).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/humidity")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["records"].is_array());
        assert!(json["records"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_series_rejected_before_store() {
        let app = test_router(0).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/pressure")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("pressure"));
    }

    #[tokio::test]
    async fn test_range_query_inclusive_bounds() {
        let app = test_router(10).await;
        let body = serde_json::json!({
            "start": "2022-01-01T00:02:00Z",
            "end": "2022-01-01T00:04:00Z",
            "descending": false,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/temperature")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["payload"], 2.0);
        assert_eq!(records[2]["payload"], 4.0);
        assert_eq!(records[0]["timestamp"], "2022-01-01T00:02:00Z");
    }

    #[tokio::test]
    async fn test_non_integer_page_is_json_400() {
        let app = test_router(5).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/temperature?page=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("page"));
    }

    #[tokio::test]
    async fn test_body_missing_start_is_json_400() {
        let app = test_router(5).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/temperature")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("start"));
    }

    #[tokio::test]
    async fn test_malformed_timestamp_is_validation_failure() {
        let app = test_router(5).await;
        let body = serde_json::json!({ "start": "yesterday" });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/temperature")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("start"));
    }

    #[tokio::test]
    async fn test_open_ended_range_defaults_descending() {
        let app = test_router(15).await;
        let body = serde_json::json!({ "start": "2022-01-01T00:00:00Z" });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/temperature")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0]["payload"], 14.0);
        assert!(json.get("archive_error").is_none());
    }
}
