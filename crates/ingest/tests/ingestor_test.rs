//! Fan-out behavior of [`Ingestor`] against a fake feed and the in-memory store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use postgate_core::config::IngestConfig;
use postgate_core::{Page, Record};
use postgate_ingest::{FeedError, IngestService, Ingestor, PageError, PageSource};
use postgate_rpc::services::{EmptyRequest, IngestStatus};
use postgate_rpc::{topics, Message, Service, ServiceError};
use postgate_storage::{MemoryRecordStore, RecordStore};

/// Serves `pages` pages of `per_page` records. Ids run 1.. across pages.
struct FakeFeed {
    pages: u32,
    per_page: u32,
    failing_page: Option<u32>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fetched: AtomicUsize,
}

impl FakeFeed {
    fn new(pages: u32, per_page: u32) -> Self {
        Self {
            pages,
            per_page,
            failing_page: None,
            delay: Duration::from_millis(5),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fetched: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageSource for FakeFeed {
    async fn fetch_page(&self, page: u32) -> Result<Page, FeedError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.fetched.fetch_add(1, Ordering::SeqCst);

        if self.failing_page == Some(page) {
            return Err(FeedError::Status { page, status: 500 });
        }
        let first = (page - 1) * self.per_page + 1;
        let data = (first..first + self.per_page)
            .map(|id| Record {
                id: id as i32,
                owner_id: page as i32,
                title: format!("title {id}"),
                body: format!("body {id}"),
            })
            .collect();
        Ok(Page::new(page, self.pages, data))
    }
}

fn config(total_pages: u32, max_concurrency: u32) -> IngestConfig {
    IngestConfig {
        feed_url: "http://feed.invalid/posts".into(),
        total_pages,
        max_concurrency,
        http_timeout_secs: 5,
    }
}

#[tokio::test]
async fn every_record_of_every_page_lands() {
    let feed = Arc::new(FakeFeed::new(10, 7));
    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(feed.clone(), store.clone(), &config(10, 4));

    let report = ingestor.run().await;

    assert!(report.is_success());
    assert_eq!(report.pages_succeeded, 10);
    assert_eq!(report.records_inserted, 70);
    assert_eq!(feed.fetched.load(Ordering::SeqCst), 10);

    let ids: HashSet<i32> = store.rows().iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=70).collect());
}

#[tokio::test]
async fn insert_batches_never_interleave() {
    let feed = Arc::new(FakeFeed::new(8, 5));
    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(feed, store.clone(), &config(8, 8));

    assert!(ingestor.run().await.is_success());
    assert_eq!(store.max_concurrent_writers(), 1);

    // Each page's rows are contiguous in insertion order.
    let rows = store.rows();
    for chunk in rows.chunks(5) {
        let owner = chunk[0].owner_id;
        assert!(chunk.iter().all(|r| r.owner_id == owner));
    }
}

#[tokio::test]
async fn fetch_concurrency_is_bounded() {
    let mut fake = FakeFeed::new(12, 1);
    fake.delay = Duration::from_millis(30);
    let feed = Arc::new(fake);
    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(feed.clone(), store, &config(12, 3));

    assert!(ingestor.run().await.is_success());
    let max = feed.max_active.load(Ordering::SeqCst);
    assert!(max <= 3, "saw {max} concurrent fetches");
    assert!(max >= 2);
}

#[tokio::test]
async fn one_bad_page_does_not_stop_the_others() {
    let mut fake = FakeFeed::new(5, 2);
    fake.failing_page = Some(3);
    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(Arc::new(fake), store.clone(), &config(5, 2));

    let report = ingestor.run().await;

    assert!(!report.is_success());
    assert_eq!(report.failed_pages(), vec![3]);
    assert_eq!(report.pages_succeeded, 4);
    assert_eq!(store.rows().len(), 8);
    assert!(matches!(
        report.first_failure().map(|f| &f.error),
        Some(PageError::Fetch(FeedError::Status { page: 3, status: 500 }))
    ));
}

#[tokio::test]
async fn storage_failure_is_reported_per_page() {
    let store = Arc::new(MemoryRecordStore::failing_on(4));
    let ingestor = Ingestor::new(Arc::new(FakeFeed::new(3, 3)), store.clone(), &config(3, 3));

    let report = ingestor.run().await;

    assert_eq!(report.failed_pages(), vec![2]);
    assert!(matches!(
        report.first_failure().map(|f| &f.error),
        Some(PageError::Store(_))
    ));
    assert_eq!(store.rows().len(), 6);
}

#[tokio::test]
async fn dropped_run_keeps_working() {
    let mut fake = FakeFeed::new(4, 2);
    fake.delay = Duration::from_millis(100);
    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(Arc::new(fake), store.clone(), &config(4, 4));

    let waited = tokio::time::timeout(Duration::from_millis(20), ingestor.run()).await;
    assert!(waited.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.list().await.unwrap().len(), 8);
}

#[tokio::test]
async fn service_replies_with_status() {
    let store = Arc::new(MemoryRecordStore::new());
    let service = IngestService::new(Ingestor::new(
        Arc::new(FakeFeed::new(2, 3)),
        store,
        &config(2, 8),
    ));

    let request = Message::new(topics::PARSE_RUN, &EmptyRequest {}).unwrap();
    let reply = service.handle(request).await.unwrap();
    assert_eq!(reply.topic, "svc.parse.run.reply");
    let status: IngestStatus = reply.decode().unwrap();
    assert_eq!(status.info, "Ok");
    assert_eq!(status.records, 6);
}

#[tokio::test]
async fn service_reports_failed_run_as_error() {
    let mut fake = FakeFeed::new(3, 1);
    fake.failing_page = Some(1);
    let service = IngestService::new(Ingestor::new(
        Arc::new(fake),
        Arc::new(MemoryRecordStore::new()),
        &config(3, 8),
    ));

    let err: ServiceError = service.ingest().await.unwrap_err();
    assert_eq!(err.code, 502);
    assert!(err.message.contains("page 1"));
}
