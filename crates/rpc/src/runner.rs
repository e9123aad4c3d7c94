//! Drives a [`Service`] behind a [`RequestHandler`] until shutdown.
//!
//! Every request runs in its own task so a long ingestion run never blocks
//! reads or pings. Handlers are tracked by correlation id; a
//! [`topics::CANCEL`] frame aborts the matching task, and the deadline carried
//! in the envelope bounds how long the handler may run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RpcError;
use crate::message::Message;
use crate::reqrep::ReplyToken;
use crate::services::{ServiceError, Status};
use crate::topics;
use crate::traits::{RequestHandler, Service};

type InFlightMap = Arc<Mutex<HashMap<Uuid, AbortHandle>>>;

pub struct ServiceRunner;

impl ServiceRunner {
    /// Serve requests until SIGINT/SIGTERM or until `shutdown_notify` fires.
    ///
    /// Handlers still running at shutdown are aborted.
    pub async fn run(
        server: Arc<dyn RequestHandler>,
        service: Arc<dyn Service>,
        shutdown_notify: Option<Arc<Notify>>,
    ) -> Result<(), RpcError> {
        let name = service.name().to_string();
        info!(service = %name, "service runner started");

        let in_flight: InFlightMap = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Self::wait_for_shutdown(shutdown_notify);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(service = %name, "shutdown signal received");
                    break Ok(());
                }
                received = server.recv_request() => match received {
                    Ok((token, request)) => {
                        Self::dispatch(&server, &service, &in_flight, token, request).await;
                    }
                    Err(RpcError::Closed) => break Err(RpcError::Closed),
                    Err(e) => warn!(service = %name, error = %e, "dropping unreadable request"),
                },
            }
        };

        let mut remaining = in_flight.lock().await;
        if !remaining.is_empty() {
            warn!(service = %name, count = remaining.len(), "aborting in-flight requests");
        }
        for (_, handle) in remaining.drain() {
            handle.abort();
        }
        info!(service = %name, "service runner stopped");
        outcome
    }

    async fn dispatch(
        server: &Arc<dyn RequestHandler>,
        service: &Arc<dyn Service>,
        in_flight: &InFlightMap,
        token: ReplyToken,
        request: Message,
    ) {
        let cid = request.correlation_id;

        if request.topic == topics::PING {
            let reply = match request.reply(&Status::new("pong")) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "failed to encode pong");
                    return;
                }
            };
            if let Err(e) = server.send_reply(token, reply).await {
                warn!(error = %e, "failed to send pong");
            }
        } else if request.topic == topics::CANCEL {
            match in_flight.lock().await.remove(&cid) {
                Some(handle) => {
                    handle.abort();
                    info!(
                        service = %service.name(),
                        correlation_id = %cid,
                        "request cancelled by caller"
                    );
                }
                None => debug!(correlation_id = %cid, "cancel for a request that already finished"),
            }
        } else {
            let (go_tx, go_rx) = oneshot::channel::<()>();
            let server = Arc::clone(server);
            let service = Arc::clone(service);
            let map = Arc::clone(in_flight);

            let task = tokio::spawn(async move {
                // Wait until the abort handle is registered so the cleanup below
                // cannot run before the insert.
                if go_rx.await.is_err() {
                    return;
                }
                let reply = Self::handle(&*service, request).await;
                map.lock().await.remove(&cid);
                if let Some(reply) = reply {
                    if let Err(e) = server.send_reply(token, reply).await {
                        warn!(correlation_id = %cid, error = %e, "failed to send reply");
                    }
                }
            });

            in_flight.lock().await.insert(cid, task.abort_handle());
            let _ = go_tx.send(());
        }
    }

    /// Run the handler within the request deadline and turn failures into
    /// `.error` replies.
    async fn handle(service: &dyn Service, request: Message) -> Option<Message> {
        let topic = request.topic.clone();
        let cid = request.correlation_id;

        let result = match request.remaining() {
            Some(left) => match tokio::time::timeout(left, service.handle(request)).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::timeout("deadline exceeded")),
            },
            None => service.handle(request).await,
        };

        match result {
            Ok(reply) => Some(reply),
            Err(err) => {
                debug!(topic = %topic, correlation_id = %cid, error = %err, "request failed");
                match Message::error_reply(&topic, &err, cid) {
                    Ok(reply) => Some(reply),
                    Err(e) => {
                        warn!(correlation_id = %cid, error = %e, "failed to encode error reply");
                        None
                    }
                }
            }
        }
    }

    /// Wait for either an OS shutdown signal or a programmatic notification.
    async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
        match external {
            Some(notify) => {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = notify.notified() => {}
                }
            }
            None => shutdown_signal().await,
        }
    }
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                warn!("could not register unix signal handlers, falling back to ctrl_c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
