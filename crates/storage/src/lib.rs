//! Persistence for feed records.
//!
//! [`RecordStore`] is the seam the services depend on. [`PgRecordStore`]
//! talks to PostgreSQL through an injected pool; [`MemoryRecordStore`] keeps
//! rows in process.

pub mod db;
pub mod error;
pub mod memory;
pub mod pg;
pub mod store;

pub use db::{ensure_schema, init_pool};
pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use pg::PgRecordStore;
pub use store::RecordStore;
