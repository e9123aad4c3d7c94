//! HTTP front for the ingestion and record services.

pub mod api;
pub mod backend;
pub mod error;
pub mod router;
pub mod state;

pub use backend::{connect_backend, IngestBackend, PostBackend, RpcIngestBackend, RpcPostBackend};
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
