use std::time::Duration;

use async_trait::async_trait;

use crate::error::RpcError;
use crate::message::Message;
use crate::reqrep::ReplyToken;
use crate::services::ServiceError;

/// Sends a request and waits for the reply with the same correlation id.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Send a request and wait up to `timeout` for its reply.
    ///
    /// Dropping the returned future before it resolves cancels the request.
    async fn request(&self, msg: Message, timeout: Duration) -> Result<Message, RpcError>;
}

/// Receives requests and routes replies back to the requesting peer.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Receive the next request from any connected client.
    async fn recv_request(&self) -> Result<(ReplyToken, Message), RpcError>;

    /// Send a reply to the client identified by `token`.
    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), RpcError>;
}

/// A backend service reachable over RPC.
///
/// The [`ServiceRunner`](crate::ServiceRunner) calls `handle` once per request,
/// each in its own task. Implementations build their success reply with
/// [`Message::reply`]; errors are turned into `.error` replies by the runner.
#[async_trait]
pub trait Service: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn handle(&self, request: Message) -> Result<Message, ServiceError>;
}
