use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use postgate_core::Record;
use postgate_rpc::services::{
    EmptyRequest, PostRequest, PostsResponse, ServiceError, Status, UpdatePostRequest,
};
use postgate_rpc::{topics, Message, Service};
use postgate_storage::{RecordStore, StoreError};

/// Record operations over a [`RecordStore`]. Each call is one statement.
pub struct RecordService {
    store: Arc<dyn RecordStore>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Record>, StoreError> {
        self.store.list().await
    }

    pub async fn get(&self, id: i32) -> Result<Record, StoreError> {
        self.store.get(id).await
    }

    pub async fn update(&self, req: &UpdatePostRequest) -> Result<Status, StoreError> {
        let rows = self.store.update(req.id, &req.patch()).await?;
        info!(id = req.id, rows, "record updated");
        Ok(Status::new("Updated"))
    }

    pub async fn delete(&self, id: i32) -> Result<Status, StoreError> {
        let rows = self.store.delete(id).await?;
        info!(id, rows, "record deleted");
        Ok(Status::new("Deleted"))
    }
}

fn to_service_error(e: StoreError) -> ServiceError {
    if let StoreError::Database(db) = &e {
        error!(error = %db, "store failure");
    }
    ServiceError::new(e.status_code(), e.to_string())
}

#[async_trait]
impl Service for RecordService {
    fn name(&self) -> &str {
        "post"
    }

    async fn handle(&self, request: Message) -> Result<Message, ServiceError> {
        debug!(topic = %request.topic, "record request");
        match request.topic.as_str() {
            topics::POST_LIST => {
                let _: EmptyRequest = request.decode()?;
                let posts = self.list().await.map_err(to_service_error)?;
                Ok(request.reply(&PostsResponse { posts })?)
            }
            topics::POST_GET => {
                let PostRequest { id } = request.decode()?;
                let record = self.get(id).await.map_err(to_service_error)?;
                Ok(request.reply(&record)?)
            }
            topics::POST_UPDATE => {
                let req: UpdatePostRequest = request.decode()?;
                let status = self.update(&req).await.map_err(to_service_error)?;
                Ok(request.reply(&status)?)
            }
            topics::POST_DELETE => {
                let PostRequest { id } = request.decode()?;
                let status = self.delete(id).await.map_err(to_service_error)?;
                Ok(request.reply(&status)?)
            }
            other => Err(ServiceError::bad_request(format!("unknown topic '{other}'"))),
        }
    }
}
