use async_trait::async_trait;

use postgate_core::{Record, RecordPatch};

use crate::error::StoreError;

/// Persistence seam shared by the ingestion and record services.
///
/// Ids come from the upstream feed and are not unique; `get` returns the
/// first matching row while `update` and `delete` touch every match.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all records of one page. Either all rows land or none do.
    async fn insert_batch(&self, records: &[Record]) -> Result<u64, StoreError>;

    async fn list(&self) -> Result<Vec<Record>, StoreError>;

    async fn get(&self, id: i32) -> Result<Record, StoreError>;

    /// Apply `patch` to every row with this id.
    ///
    /// Fails with `Invalid(EmptyUpdate)` before touching any row when the
    /// patch sets nothing, and with `NotFound` when no row matched.
    async fn update(&self, id: i32, patch: &RecordPatch) -> Result<u64, StoreError>;

    /// Remove every row with this id. Deleting a missing id is not an error.
    async fn delete(&self, id: i32) -> Result<u64, StoreError>;
}
