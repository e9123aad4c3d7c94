//! Ingestion of the paginated post feed.

pub mod feed;
pub mod ingestor;
pub mod service;

pub use feed::{FeedError, HttpFeed, PageSource};
pub use ingestor::{IngestReport, Ingestor, PageError, PageFailure};
pub use service::IngestService;
