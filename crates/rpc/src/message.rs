use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::ServiceError;
use crate::topics::{ERROR_SUFFIX, REPLY_SUFFIX};

/// Wire-format envelope for every request and reply.
///
/// Messages are serialized with MessagePack. The `topic` names the operation
/// (e.g. "svc.post.get"), `correlation_id` pairs a reply with its request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Operation topic. Replies append `.reply` or `.error`.
    pub topic: String,

    /// MessagePack-encoded payload bytes.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    /// When this message was created.
    pub timestamp: DateTime<Utc>,

    /// Correlation ID shared by a request, its reply and any cancel frame.
    pub correlation_id: Uuid,

    /// Schema version for forward-compatible evolution.
    #[serde(default = "default_version")]
    pub version: u16,

    /// Point in time after which the caller no longer waits for a reply.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Default version for messages that omit the field (backward compat).
fn default_version() -> u16 {
    1
}

impl Message {
    /// Create a new message, serializing the payload with MessagePack.
    pub fn new<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Self::with_correlation(topic, payload, Uuid::new_v4())
    }

    /// Create a message with an explicit correlation ID (for replies and cancels).
    pub fn with_correlation<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: rmp_serde::to_vec_named(payload)?,
            timestamp: Utc::now(),
            correlation_id,
            version: 1,
            deadline: None,
        })
    }

    /// Stamp a deadline `timeout` from now.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self
    }

    /// Time left until the deadline. `None` when no deadline was set;
    /// `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| {
            (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Build the success reply to this request.
    pub fn reply<T: Serialize>(&self, payload: &T) -> Result<Self, rmp_serde::encode::Error> {
        Self::with_correlation(
            format!("{}{}", self.topic, REPLY_SUFFIX),
            payload,
            self.correlation_id,
        )
    }

    /// Build the error reply for a request with the given topic and correlation id.
    pub fn error_reply(
        topic: &str,
        error: &ServiceError,
        correlation_id: Uuid,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Self::with_correlation(format!("{topic}{ERROR_SUFFIX}"), error, correlation_id)
    }

    pub fn is_error(&self) -> bool {
        self.topic.ends_with(ERROR_SUFFIX)
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.payload)
    }

    /// Serialize this entire message envelope to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Deserialize a message envelope from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Helper module for serde to handle `Vec<u8>` as raw bytes in MessagePack.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}
