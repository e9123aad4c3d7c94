use std::sync::Arc;
use std::time::Duration;

use crate::backend::{IngestBackend, PostBackend};

/// Shared handler state. Backend handles are created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<dyn IngestBackend>,
    pub posts: Arc<dyn PostBackend>,
    /// Deadline applied to every backend call.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        ingest: Arc<dyn IngestBackend>,
        posts: Arc<dyn PostBackend>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            ingest,
            posts,
            request_timeout,
        }
    }
}
