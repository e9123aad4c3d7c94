//! Request/reply over ZeroMQ DEALER/ROUTER sockets.
//!
//! - [`ZmqRequestClient`] wraps a DEALER socket for sending requests
//! - [`ZmqRequestServer`] wraps a ROUTER socket for receiving and replying
//! - [`ReplyToken`] is an opaque handle carrying the ZMQ identity frame
//!
//! Both sides hand their socket to a background task that multiplexes sends
//! and receives with `tokio::select!`, so a slow handler never blocks the
//! socket for other callers.
//!
//! ## Framing (zeromq-rs 0.4)
//!
//! zeromq-rs ROUTER pushes peer identity as first frame on recv and pops it
//! on send. DEALER sends/receives raw application frames. So:
//! - DEALER sends: `[topic, envelope]`
//! - ROUTER receives: `[identity, topic, envelope]`
//! - ROUTER sends: `[identity, topic, envelope]`
//! - DEALER receives: `[topic, envelope]`
//!
//! ## Cancellation
//!
//! A request future that is dropped before its reply arrives (caller gave up,
//! deadline hit, HTTP client disconnected) sends a [`topics::CANCEL`] frame
//! carrying the same correlation id. The server side surfaces it like any
//! other request; [`ServiceRunner`](crate::ServiceRunner) aborts the handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zeromq::prelude::*;
use zeromq::{DealerSocket, RouterSocket, ZmqMessage};

use crate::error::RpcError;
use crate::message::Message;
use crate::services::EmptyRequest;
use crate::topics;
use crate::traits::{RequestHandler, RequestSender};
use crate::transport::Transport;

/// Opaque token carrying the ZMQ routing identity bytes.
///
/// Must be passed back to [`ZmqRequestServer::send_reply`] so the reply is
/// routed to the DEALER that sent the request.
#[derive(Debug, Clone)]
pub struct ReplyToken {
    identity: Vec<u8>,
}

type PendingMap = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Message>>>>;

/// Encode a message as `[topic, envelope]` frames.
fn encode_frames(msg: &Message) -> Result<ZmqMessage, RpcError> {
    let envelope_bytes = msg.to_bytes()?;
    let mut zmq_msg = ZmqMessage::from(msg.topic.as_str());
    zmq_msg.push_back(envelope_bytes.into());
    Ok(zmq_msg)
}

/// ZeroMQ DEALER-socket client for issuing requests and awaiting replies.
///
/// The DEALER socket is owned by a background task that alternates between
/// sending outbound requests (received via an mpsc channel) and receiving
/// inbound replies (dispatched by `correlation_id`).
pub struct ZmqRequestClient {
    send_tx: mpsc::Sender<ZmqMessage>,
    pending: PendingMap,
    _loop_handle: tokio::task::JoinHandle<()>,
}

impl ZmqRequestClient {
    /// Connect a DEALER socket to a ROUTER endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, RpcError> {
        let mut socket = DealerSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting DEALER socket");
        socket.connect(&endpoint).await?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (send_tx, send_rx) = mpsc::channel::<ZmqMessage>(256);

        let loop_pending = Arc::clone(&pending);
        let loop_handle = tokio::spawn(async move {
            Self::event_loop(socket, send_rx, loop_pending).await;
        });

        Ok(Self {
            send_tx,
            pending,
            _loop_handle: loop_handle,
        })
    }

    async fn event_loop(
        mut socket: DealerSocket,
        mut send_rx: mpsc::Receiver<ZmqMessage>,
        pending: PendingMap,
    ) {
        loop {
            tokio::select! {
                Some(zmq_msg) = send_rx.recv() => {
                    if let Err(e) = socket.send(zmq_msg).await {
                        warn!(error = %e, "DEALER send failed");
                    }
                }
                result = socket.recv() => {
                    match result {
                        Ok(zmq_msg) => Self::dispatch_reply(&pending, zmq_msg).await,
                        Err(e) => {
                            debug!(error = %e, "DEALER recv loop ending");
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    }

    /// Route an inbound reply to the caller waiting on its correlation id.
    async fn dispatch_reply(
        pending: &Mutex<HashMap<Uuid, oneshot::Sender<Message>>>,
        zmq_msg: ZmqMessage,
    ) {
        let frames: Vec<_> = zmq_msg.iter().collect();

        // Skip leading empty delimiter frames.
        let data_frames: Vec<_> = frames
            .iter()
            .skip_while(|f| f.as_ref().is_empty())
            .collect();

        if data_frames.len() < 2 {
            warn!(
                raw_frame_count = frames.len(),
                data_frame_count = data_frames.len(),
                "unexpected frame count on DEALER recv"
            );
            return;
        }

        let message = match Message::from_bytes(data_frames[1].as_ref()) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to decode reply envelope");
                return;
            }
        };

        let cid = message.correlation_id;
        match pending.lock().await.remove(&cid) {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => debug!(correlation_id = %cid, "received reply for unknown correlation_id"),
        }
    }

    async fn enqueue_send(&self, msg: &Message) -> Result<(), RpcError> {
        let zmq_msg = encode_frames(msg)?;
        self.send_tx
            .send(zmq_msg)
            .await
            .map_err(|_| RpcError::Closed)
    }
}

/// Cleans up after a request that ended without a reply.
///
/// Armed from the moment the request is registered until its reply is
/// received. When dropped while armed it forgets the pending slot and tells
/// the server to abort the handler.
struct InFlight {
    cid: Uuid,
    pending: PendingMap,
    send_tx: mpsc::Sender<ZmqMessage>,
    armed: bool,
}

impl InFlight {
    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let cid = self.cid;
        match Message::with_correlation(topics::CANCEL, &EmptyRequest {}, cid)
            .map_err(RpcError::from)
            .and_then(|cancel| encode_frames(&cancel))
        {
            Ok(frames) => {
                if self.send_tx.try_send(frames).is_err() {
                    warn!(correlation_id = %cid, "could not enqueue cancel frame");
                }
            }
            Err(e) => warn!(correlation_id = %cid, error = %e, "failed to encode cancel frame"),
        }
        debug!(correlation_id = %cid, "request abandoned, cancel sent");

        let pending = Arc::clone(&self.pending);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                pending.lock().await.remove(&cid);
            });
        }
    }
}

#[async_trait]
impl RequestSender for ZmqRequestClient {
    /// Send a request and wait for a single reply matched by `correlation_id`.
    ///
    /// Returns `RpcError::Timeout` if no reply arrives within `timeout_dur`.
    async fn request(&self, msg: Message, timeout_dur: Duration) -> Result<Message, RpcError> {
        let cid = msg.correlation_id;
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.insert(cid, tx);
        let in_flight = InFlight {
            cid,
            pending: Arc::clone(&self.pending),
            send_tx: self.send_tx.clone(),
            armed: true,
        };

        self.enqueue_send(&msg).await?;
        debug!(correlation_id = %cid, topic = %msg.topic, "sent request");

        match tokio::time::timeout(timeout_dur, rx).await {
            Ok(Ok(reply)) => {
                in_flight.complete();
                Ok(reply)
            }
            Ok(Err(_)) => Err(RpcError::Transport(
                "reply channel closed unexpectedly".into(),
            )),
            Err(_) => Err(RpcError::Timeout(timeout_dur)),
        }
    }
}

/// ZeroMQ ROUTER-socket server for receiving requests and sending replies.
///
/// Each received message includes the peer identity, wrapped in a
/// [`ReplyToken`] for routing the reply back.
pub struct ZmqRequestServer {
    inbound: Mutex<mpsc::Receiver<Result<(ReplyToken, Message), RpcError>>>,
    outbound: mpsc::Sender<ZmqMessage>,
    _loop_handle: tokio::task::JoinHandle<()>,
}

impl ZmqRequestServer {
    /// Bind a ROUTER socket on the given transport endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, RpcError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let mut socket = RouterSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding ROUTER socket");
        socket.bind(&endpoint).await?;

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let loop_handle = tokio::spawn(async move {
            Self::event_loop(socket, outbound_rx, inbound_tx).await;
        });

        Ok(Self {
            inbound: Mutex::new(inbound_rx),
            outbound: outbound_tx,
            _loop_handle: loop_handle,
        })
    }

    async fn event_loop(
        mut socket: RouterSocket,
        mut outbound: mpsc::Receiver<ZmqMessage>,
        inbound: mpsc::Sender<Result<(ReplyToken, Message), RpcError>>,
    ) {
        loop {
            tokio::select! {
                Some(zmq_msg) = outbound.recv() => {
                    if let Err(e) = socket.send(zmq_msg).await {
                        warn!(error = %e, "ROUTER send failed");
                    }
                }
                result = socket.recv() => {
                    let parsed = match result {
                        Ok(zmq_msg) => Self::parse_request(zmq_msg),
                        Err(e) => {
                            debug!(error = %e, "ROUTER recv loop ending");
                            break;
                        }
                    };
                    if inbound.send(parsed).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    }

    /// Split `[identity, topic, envelope]` into a token and the decoded message.
    fn parse_request(zmq_msg: ZmqMessage) -> Result<(ReplyToken, Message), RpcError> {
        let frames: Vec<_> = zmq_msg.iter().collect();

        if frames.len() < 2 {
            return Err(RpcError::Transport(format!(
                "expected at least 2 frames from ROUTER, got {}",
                frames.len()
            )));
        }

        let identity = frames[0].as_ref().to_vec();

        // Skip identity and any empty delimiter frames to find [topic, envelope].
        let data_frames: Vec<_> = frames[1..]
            .iter()
            .skip_while(|f| f.as_ref().is_empty())
            .collect();

        if data_frames.len() < 2 {
            return Err(RpcError::Transport(format!(
                "expected [topic, envelope] after identity, got {} data frames",
                data_frames.len()
            )));
        }

        let message = Message::from_bytes(data_frames[1].as_ref())?;

        debug!(
            correlation_id = %message.correlation_id,
            topic = %message.topic,
            "received request"
        );

        Ok((ReplyToken { identity }, message))
    }
}

#[async_trait]
impl RequestHandler for ZmqRequestServer {
    async fn recv_request(&self) -> Result<(ReplyToken, Message), RpcError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(RpcError::Closed))
    }

    /// Frames sent: `[identity, topic, envelope]`.
    /// ROUTER pops identity and routes the remaining frames to the peer.
    async fn send_reply(&self, token: ReplyToken, reply: Message) -> Result<(), RpcError> {
        let envelope_bytes = reply.to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(token.identity);
        zmq_msg.push_back(reply.topic.as_bytes().to_vec().into());
        zmq_msg.push_back(envelope_bytes.into());

        self.outbound
            .send(zmq_msg)
            .await
            .map_err(|_| RpcError::Closed)?;

        debug!(
            correlation_id = %reply.correlation_id,
            topic = %reply.topic,
            "sent reply"
        );
        Ok(())
    }
}
