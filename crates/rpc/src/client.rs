use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::RpcError;
use crate::message::Message;
use crate::reqrep::ZmqRequestClient;
use crate::services::{EmptyRequest, ServiceError, Status};
use crate::topics;
use crate::traits::RequestSender;
use crate::transport::Transport;

/// Typed front for one backend service.
///
/// Wraps a [`RequestSender`] and turns `.error` replies into
/// [`RpcError::Service`] so callers can match on the remote status code.
#[derive(Clone)]
pub struct ServiceClient {
    name: String,
    sender: Arc<dyn RequestSender>,
}

impl ServiceClient {
    /// Connect a DEALER socket to the named service.
    pub async fn connect(name: impl Into<String>, transport: &Transport) -> Result<Self, RpcError> {
        let sender = ZmqRequestClient::connect(transport).await?;
        Ok(Self::new(name, Arc::new(sender)))
    }

    pub fn new(name: impl Into<String>, sender: Arc<dyn RequestSender>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send `request` on `topic` and decode the reply.
    ///
    /// The deadline is stamped into the envelope so the service can stop
    /// working once nobody is waiting anymore.
    pub async fn call<Req, Resp>(
        &self,
        topic: &str,
        request: &Req,
        deadline: Duration,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let msg = Message::new(topic, request)?.with_deadline(deadline);
        debug!(
            service = %self.name,
            topic,
            correlation_id = %msg.correlation_id,
            "calling service"
        );

        let reply = self.sender.request(msg, deadline).await?;
        if reply.is_error() {
            let err: ServiceError = reply.decode()?;
            return Err(RpcError::Service(err));
        }
        Ok(reply.decode()?)
    }

    /// Liveness probe; succeeds when the service answers "pong".
    pub async fn ping(&self, timeout: Duration) -> Result<(), RpcError> {
        let status: Status = self.call(topics::PING, &EmptyRequest {}, timeout).await?;
        if status.info == "pong" {
            Ok(())
        } else {
            Err(RpcError::Transport(format!(
                "unexpected ping reply from {}: {}",
                self.name, status.info
            )))
        }
    }
}
