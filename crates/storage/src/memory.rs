//! In-process [`RecordStore`] used by tests and local runs without a database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use postgate_core::{Record, RecordPatch};

use crate::error::StoreError;
use crate::store::RecordStore;

/// Rows are kept in insertion order. `insert_batch` yields between rows, so
/// two unsynchronized writers would interleave their pages.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<Vec<Record>>,
    failing_id: Option<i32>,
    active_writers: AtomicUsize,
    max_writers: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any batch containing a record with this id.
    pub fn failing_on(id: i32) -> Self {
        Self {
            failing_id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            rows: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Snapshot of all rows in insertion order.
    pub fn rows(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Highest number of `insert_batch` calls seen running at once.
    pub fn max_concurrent_writers(&self) -> usize {
        self.max_writers.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct WriterGuard<'a>(&'a AtomicUsize);

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_batch(&self, records: &[Record]) -> Result<u64, StoreError> {
        let active = self.active_writers.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = WriterGuard(&self.active_writers);
        self.max_writers.fetch_max(active, Ordering::SeqCst);

        if let Some(bad) = self.failing_id {
            if records.iter().any(|r| r.id == bad) {
                return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                    "refusing to insert record {bad}"
                ))));
            }
        }

        for record in records {
            self.lock().push(record.clone());
            tokio::task::yield_now().await;
        }
        Ok(records.len() as u64)
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.rows())
    }

    async fn get(&self, id: i32) -> Result<Record, StoreError> {
        self.lock()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: i32, patch: &RecordPatch) -> Result<u64, StoreError> {
        patch.validate()?;
        let mut rows = self.lock();
        let mut touched = 0;
        for record in rows.iter_mut().filter(|r| r.id == id) {
            patch.apply(record);
            touched += 1;
        }
        if touched == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(touched)
    }

    async fn delete(&self, id: i32) -> Result<u64, StoreError> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok((before - rows.len()) as u64)
    }
}
