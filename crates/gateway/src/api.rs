use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use postgate_core::Record;
use postgate_rpc::services::{IngestStatus, Status, UpdatePostRequest};
use postgate_rpc::RpcError;

use crate::error::ApiError;
use crate::state::AppState;

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Helpers ───────────────────────────────────────────────────────

/// Bound a backend call by the request deadline. Expiry drops the call,
/// which cancels it downstream.
async fn within<T, F>(deadline: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ApiError::Upstream(RpcError::Timeout(deadline))),
    }
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId(raw.to_string()))
}

/// PUT body. Missing, null and empty-string fields all mean "leave unchanged".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl UpdateBody {
    pub fn into_request(self, id: i32) -> UpdatePostRequest {
        UpdatePostRequest {
            id,
            title: self.title.filter(|s| !s.is_empty()),
            body: self.body.filter(|s| !s.is_empty()),
        }
    }
}

// ── Ingestion ─────────────────────────────────────────────────────

pub async fn parse(State(state): State<AppState>) -> Result<Json<IngestStatus>, ApiError> {
    let deadline = state.request_timeout;
    let status = within(deadline, state.ingest.ingest(deadline)).await?;
    Ok(Json(status))
}

// ── Records ───────────────────────────────────────────────────────

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Record>>, ApiError> {
    let deadline = state.request_timeout;
    let posts = within(deadline, state.posts.list(deadline)).await?;
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&raw_id)?;
    let deadline = state.request_timeout;
    let record = within(deadline, state.posts.get(id, deadline)).await?;
    Ok(Json(record))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<Status>, ApiError> {
    let id = parse_id(&raw_id)?;
    let update: UpdateBody =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    let req = update.into_request(id);
    debug!(id, title = req.title.is_some(), body = req.body.is_some(), "update requested");

    let deadline = state.request_timeout;
    let status = within(deadline, state.posts.update(req, deadline)).await?;
    Ok(Json(status))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Status>, ApiError> {
    let id = parse_id(&raw_id)?;
    let deadline = state.request_timeout;
    let status = within(deadline, state.posts.delete(id, deadline)).await?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_mean_not_supplied() {
        let body: UpdateBody = serde_json::from_str(r#"{"title": "X", "body": ""}"#).unwrap();
        let req = body.into_request(3);
        assert_eq!(req.title.as_deref(), Some("X"));
        assert_eq!(req.body, None);

        let body: UpdateBody = serde_json::from_str(r#"{"body": null}"#).unwrap();
        let req = body.into_request(3);
        assert!(req.title.is_none() && req.body.is_none());
    }

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("17").unwrap(), 17);
        assert!(matches!(parse_id("abc"), Err(ApiError::InvalidId(_))));
        assert!(matches!(parse_id("1.5"), Err(ApiError::InvalidId(_))));
    }
}
