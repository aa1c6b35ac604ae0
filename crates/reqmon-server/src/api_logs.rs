//! Request log API handlers.
//!
//! Provides:
//! - `POST /api/ingest`: classify and record one request descriptor
//! - `GET /api/logs`: filtered, sorted, paginated report
//! - `GET /api/logs/{id}`: every field of one record
//! - `DELETE /api/logs`: empty the log

use crate::api::{blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    Json,
};
use reqmon_ingest::{RawRequest, SkipReason};
use reqmon_log::{resolve_sort_column, LogFilter, Recorded, SearchPage, SearchRequest};
use reqmon_types::{format_timestamp, parse_timestamp, DeviceType, LogRecord, SortOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for `POST /api/ingest`.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

/// Query parameters for `GET /api/logs`.
///
/// Everything is optional and kept as text so that loose input (an empty
/// `page=`, an unknown `sort_by`) degrades to defaults instead of a 400.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Substring matched against url, ip, user agent, referer, browser, method.
    pub search: Option<String>,
    /// `Desktop`, `Mobile`, or `Tablet`.
    pub device: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    pub sort_by: Option<String>,
    /// `asc` or `desc`.
    pub sort_order: Option<String>,
    /// Exact client IP.
    pub ip: Option<String>,
    /// Inclusive lower bound: RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`.
    pub since: Option<String>,
    /// Inclusive upper bound, same formats as `since`.
    pub until: Option<String>,
}

impl LogsQuery {
    fn into_search_request(self) -> Result<SearchRequest, ApiError> {
        let device_type = non_blank(self.device)
            .map(|d| {
                d.parse::<DeviceType>()
                    .map_err(|_| ApiError::BadRequest(format!("invalid device: {}", d)))
            })
            .transpose()?;

        let filter = LogFilter {
            search: non_blank(self.search),
            device_type,
            ip_address: non_blank(self.ip),
            since: time_bound("since", self.since)?,
            until: time_bound("until", self.until)?,
        };

        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1);

        Ok(SearchRequest {
            filter,
            sort_by: resolve_sort_column(self.sort_by.as_deref()),
            sort_order: self
                .sort_order
                .as_deref()
                .map(SortOrder::from_param)
                .unwrap_or_default(),
            page,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalizes a range parameter to the storage timestamp format.
fn time_bound(name: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(|at| Some(format_timestamp(at)))
            .ok_or_else(|| ApiError::BadRequest(format!("invalid {}: {}", name, raw))),
    }
}

/// Handler for `POST /api/ingest`.
///
/// Returns `201` with the new id, or `202` with the reason when the capture
/// gate skips the request.
pub async fn ingest_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RawRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    // Malformed bodies get the same JSON error shape as every other 400.
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = blocking(move || state.monitor.record(&request)).await?;

    Ok(match outcome {
        Recorded::Stored(id) => (
            StatusCode::CREATED,
            Json(IngestResponse {
                recorded: true,
                id: Some(id),
                reason: None,
            }),
        ),
        Recorded::Skipped(reason) => (
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                recorded: false,
                id: None,
                reason: Some(reason),
            }),
        ),
    })
}

/// Handler for `GET /api/logs`.
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<SearchPage>, ApiError> {
    let request = params.into_search_request()?;
    let page = blocking(move || state.monitor.search(&request)).await?;
    Ok(Json(page))
}

/// Handler for `GET /api/logs/{id}`.
pub async fn details_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<LogRecord>, ApiError> {
    blocking(move || state.monitor.details(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("log entry {} not found", id)))
}

/// Response body for `DELETE /api/logs`.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub deleted: usize,
}

/// Handler for `DELETE /api/logs`.
pub async fn clear_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ClearResponse>, ApiError> {
    let deleted = blocking(move || state.monitor.clear_all()).await?;
    Ok(Json(ClearResponse {
        success: true,
        deleted,
    }))
}
