use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use postgate_rpc::RpcError;

/// Everything a handler can fail with. Rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Path id is not an integer. Reported as a missing resource.
    #[error("invalid post id '{0}'")]
    InvalidId(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Upstream(#[from] RpcError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidId(_) => StatusCode::NOT_FOUND,
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(RpcError::Service(e)) => match e.code {
                400 => StatusCode::BAD_REQUEST,
                404 => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
