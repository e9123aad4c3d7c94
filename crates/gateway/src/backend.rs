//! Backend seams used by the HTTP handlers.
//!
//! Production wires them to [`ServiceClient`]s; tests plug in fakes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use postgate_core::Record;
use postgate_rpc::services::{
    EmptyRequest, IngestStatus, PostRequest, PostsResponse, Status, UpdatePostRequest,
};
use postgate_rpc::{topics, RpcConfig, RpcError, ServiceClient};

/// Connect to the named backend and make sure it answers a ping.
///
/// The client carries no deadline of its own: every call is bounded by the
/// deadline the handler passes in.
pub async fn connect_backend(
    rpc: &RpcConfig,
    name: &str,
    ping_timeout: Duration,
) -> Result<ServiceClient, RpcError> {
    let transport = rpc.service_transport(name)?;
    let client = ServiceClient::connect(name, &transport).await?;
    client.ping(ping_timeout).await?;
    info!(service = name, endpoint = %transport, "backend reachable");
    Ok(client)
}

#[async_trait]
pub trait IngestBackend: Send + Sync {
    async fn ingest(&self, deadline: Duration) -> Result<IngestStatus, RpcError>;
}

#[async_trait]
pub trait PostBackend: Send + Sync {
    async fn list(&self, deadline: Duration) -> Result<Vec<Record>, RpcError>;
    async fn get(&self, id: i32, deadline: Duration) -> Result<Record, RpcError>;
    async fn update(&self, req: UpdatePostRequest, deadline: Duration) -> Result<Status, RpcError>;
    async fn delete(&self, id: i32, deadline: Duration) -> Result<Status, RpcError>;
}

pub struct RpcIngestBackend {
    client: ServiceClient,
}

impl RpcIngestBackend {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IngestBackend for RpcIngestBackend {
    async fn ingest(&self, deadline: Duration) -> Result<IngestStatus, RpcError> {
        self.client
            .call(topics::PARSE_RUN, &EmptyRequest {}, deadline)
            .await
    }
}

pub struct RpcPostBackend {
    client: ServiceClient,
}

impl RpcPostBackend {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostBackend for RpcPostBackend {
    async fn list(&self, deadline: Duration) -> Result<Vec<Record>, RpcError> {
        let resp: PostsResponse = self
            .client
            .call(topics::POST_LIST, &EmptyRequest {}, deadline)
            .await?;
        Ok(resp.posts)
    }

    async fn get(&self, id: i32, deadline: Duration) -> Result<Record, RpcError> {
        self.client
            .call(topics::POST_GET, &PostRequest { id }, deadline)
            .await
    }

    async fn update(&self, req: UpdatePostRequest, deadline: Duration) -> Result<Status, RpcError> {
        self.client.call(topics::POST_UPDATE, &req, deadline).await
    }

    async fn delete(&self, id: i32, deadline: Duration) -> Result<Status, RpcError> {
        self.client
            .call(topics::POST_DELETE, &PostRequest { id }, deadline)
            .await
    }
}
