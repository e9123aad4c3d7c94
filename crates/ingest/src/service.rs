use async_trait::async_trait;
use tracing::info;

use postgate_rpc::services::{EmptyRequest, IngestStatus, ServiceError};
use postgate_rpc::{topics, Message, Service};

use crate::ingestor::{IngestReport, Ingestor, PageError};

/// Answers `svc.parse.run` by running one full ingestion.
pub struct IngestService {
    ingestor: Ingestor,
}

impl IngestService {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }

    /// Run one ingestion and turn its report into a reply payload.
    pub async fn ingest(&self) -> Result<IngestStatus, ServiceError> {
        let report = self.ingestor.run().await;
        report_to_status(&report)
    }
}

/// `Ok` only when every page landed. Otherwise the error is classed by the
/// first failed page: 502 for fetch failures, 500 for everything else.
pub fn report_to_status(report: &IngestReport) -> Result<IngestStatus, ServiceError> {
    let Some(first) = report.first_failure() else {
        return Ok(IngestStatus {
            info: "Ok".into(),
            pages: report.pages_succeeded,
            records: report.records_inserted,
        });
    };

    let pages = report
        .failed_pages()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!(
        "ingestion failed for {} of {} pages ({pages}); first error on page {}: {}",
        report.failures.len(),
        report.pages_requested,
        first.page,
        first.error
    );
    Err(match first.error {
        PageError::Fetch(_) => ServiceError::bad_gateway(message),
        PageError::Store(_) | PageError::Aborted => ServiceError::internal(message),
    })
}

#[async_trait]
impl Service for IngestService {
    fn name(&self) -> &str {
        "parse"
    }

    async fn handle(&self, request: Message) -> Result<Message, ServiceError> {
        match request.topic.as_str() {
            topics::PARSE_RUN => {
                let _: EmptyRequest = request.decode()?;
                info!(correlation_id = %request.correlation_id, "ingestion requested");
                let status = self.ingest().await?;
                Ok(request.reply(&status)?)
            }
            other => Err(ServiceError::bad_request(format!("unknown topic '{other}'"))),
        }
    }
}
