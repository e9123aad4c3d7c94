//! Concurrent fan-out ingestion.
//!
//! One run spawns one worker per page. Fetches are bounded by a semaphore;
//! insert batches are serialized by a mutex shared by the run so pages land
//! in the store one at a time. The run owns its workers in a detached task:
//! dropping the future returned by [`Ingestor::run`] stops the wait, not the
//! work.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use postgate_core::config::IngestConfig;
use postgate_storage::{RecordStore, StoreError};

use crate::feed::{FeedError, PageSource};

/// Why a single page did not make it into the store.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FeedError),

    #[error("insert failed: {0}")]
    Store(#[from] StoreError),

    #[error("worker stopped before finishing")]
    Aborted,
}

#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: PageError,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub pages_requested: u32,
    pub pages_succeeded: u32,
    pub records_inserted: u64,
    /// Failed pages in ascending page order.
    pub failures: Vec<PageFailure>,
}

impl IngestReport {
    /// Fold per-page slots (index = page - 1) into a report. Empty slots
    /// belong to workers that never reported back.
    fn from_slots(slots: Vec<Option<Result<u64, PageError>>>) -> Self {
        let mut report = Self {
            pages_requested: slots.len() as u32,
            ..Self::default()
        };
        for (idx, slot) in slots.into_iter().enumerate() {
            let page = idx as u32 + 1;
            match slot.unwrap_or(Err(PageError::Aborted)) {
                Ok(inserted) => {
                    report.pages_succeeded += 1;
                    report.records_inserted += inserted;
                }
                Err(error) => report.failures.push(PageFailure { page, error }),
            }
        }
        report
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.page).collect()
    }

    pub fn first_failure(&self) -> Option<&PageFailure> {
        self.failures.first()
    }
}

/// Runs ingestion of `total_pages` pages from a [`PageSource`] into a [`RecordStore`].
#[derive(Clone)]
pub struct Ingestor {
    source: Arc<dyn PageSource>,
    store: Arc<dyn RecordStore>,
    total_pages: u32,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn RecordStore>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            source,
            store,
            total_pages: config.total_pages,
            concurrency: config.concurrency(),
        }
    }

    /// Ingest every page and wait for all workers to finish.
    pub async fn run(&self) -> IngestReport {
        let this = self.clone();
        match tokio::spawn(async move { this.fan_out().await }).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "ingestion run did not complete");
                IngestReport::from_slots((0..self.total_pages).map(|_| None).collect())
            }
        }
    }

    async fn fan_out(&self) -> IngestReport {
        info!(
            pages = self.total_pages,
            concurrency = self.concurrency,
            "ingestion run started"
        );
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let write_lock = Arc::new(Mutex::new(()));

        let mut workers = JoinSet::new();
        for page in 1..=self.total_pages {
            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);
            let write_lock = Arc::clone(&write_lock);
            workers.spawn(async move {
                let outcome =
                    ingest_page(page, &*source, &*store, &permits, &write_lock).await;
                (page, outcome)
            });
        }

        let mut slots: Vec<Option<Result<u64, PageError>>> =
            (0..self.total_pages).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((page, outcome)) => {
                    if let Err(e) = &outcome {
                        warn!(page, error = %e, "page failed");
                    }
                    slots[(page - 1) as usize] = Some(outcome);
                }
                Err(e) => warn!(error = %e, "page worker panicked"),
            }
        }

        let report = IngestReport::from_slots(slots);
        info!(
            pages = report.pages_succeeded,
            failed = report.failures.len(),
            records = report.records_inserted,
            "ingestion run finished"
        );
        report
    }
}

async fn ingest_page(
    page: u32,
    source: &dyn PageSource,
    store: &dyn RecordStore,
    permits: &Semaphore,
    write_lock: &Mutex<()>,
) -> Result<u64, PageError> {
    let fetched = {
        let _permit = permits.acquire().await.map_err(|_| PageError::Aborted)?;
        source.fetch_page(page).await?
    };

    let _writing = write_lock.lock().await;
    let inserted = store.insert_batch(&fetched.data).await?;
    debug!(page, records = inserted, "page stored");
    Ok(inserted)
}
