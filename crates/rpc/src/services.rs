//! Request/response payloads exchanged between the gateway and the backend
//! services, serialized with MessagePack via [`Message::new`](crate::Message::new).

use serde::{Deserialize, Serialize};

use postgate_core::{Record, RecordPatch};

/// Payload for operations that take no input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyRequest {}

/// Generic acknowledgement, e.g. `{"info": "Deleted"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub info: String,
}

impl Status {
    pub fn new(info: impl Into<String>) -> Self {
        Self { info: info.into() }
    }
}

// ─── Ingestion Service ─────────────────────────────────────────────────────

/// Reply to a successful ingestion run. `info` is always "Ok".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatus {
    pub info: String,
    /// Pages fetched and written.
    pub pages: u32,
    /// Rows inserted across all pages.
    pub records: u64,
}

// ─── Record Service ────────────────────────────────────────────────────────

/// Addresses one record by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Record>,
}

/// Partial update. An absent field is left unchanged; `Some("")` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl UpdatePostRequest {
    pub fn patch(&self) -> RecordPatch {
        RecordPatch {
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

// ─── Generic Service Error ─────────────────────────────────────────────────

/// Returned when a service fails to process a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// HTTP-style status code (e.g. 400, 404, 500).
    pub code: u16,
    /// Human-readable error description.
    pub message: String,
}

impl ServiceError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Upstream dependency (the external feed) failed.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(502, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(504, message)
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<rmp_serde::decode::Error> for ServiceError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::bad_request(format!("malformed request payload: {e}"))
    }
}

impl From<rmp_serde::encode::Error> for ServiceError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::internal(format!("failed to encode reply: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn update_request_distinguishes_absent_from_empty() {
        let req = UpdatePostRequest {
            id: 3,
            title: Some("X".into()),
            body: Some(String::new()),
        };
        let msg = Message::new("svc.post.update", &req).unwrap();
        let decoded: UpdatePostRequest = msg.decode().unwrap();
        assert_eq!(decoded.body.as_deref(), Some(""));

        let absent = UpdatePostRequest {
            id: 3,
            title: Some("X".into()),
            body: None,
        };
        let decoded: UpdatePostRequest = Message::new("svc.post.update", &absent)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(decoded.body, None);
        assert_eq!(decoded.patch().title.as_deref(), Some("X"));
    }

    #[test]
    fn posts_response_json_shape() {
        let resp = PostsResponse {
            posts: vec![Record {
                id: 1,
                owner_id: 2,
                title: "t".into(),
                body: "b".into(),
            }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["posts"][0]["user_id"], 2);
    }

    #[test]
    fn decode_failure_maps_to_bad_request() {
        let msg = Message::new("svc.post.get", &"not an id".to_string()).unwrap();
        let err: ServiceError = msg.decode::<PostRequest>().unwrap_err().into();
        assert_eq!(err.code, 400);
        assert!(err.message.contains("malformed request payload"));
    }

    #[test]
    fn service_error_display_includes_code() {
        let err = ServiceError::not_found("record 42 not found");
        assert_eq!(err.code, 404);
        assert_eq!(err.to_string(), "record 42 not found (404)");
    }
}
