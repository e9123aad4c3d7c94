//! Backend calls get the gateway's request deadline, whatever endpoint
//! config the backend clients were built from.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::Notify;
use tower::ServiceExt;

use postgate_core::config::Config;
use postgate_gateway::{build_router, connect_backend, AppState, RpcIngestBackend, RpcPostBackend};
use postgate_rpc::config::{PARSE_SERVICE, POST_SERVICE};
use postgate_rpc::services::{IngestStatus, PostsResponse};
use postgate_rpc::transport::Transport;
use postgate_rpc::{
    topics, Message, RpcConfig, Service, ServiceError, ServiceRunner, ZmqRequestServer,
};

const SETTLE: Duration = Duration::from_millis(200);

/// Answers list and ingest calls and remembers how much time the caller left it.
#[derive(Default)]
struct DeadlineRecorder {
    seen: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Service for DeadlineRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn handle(&self, request: Message) -> Result<Message, ServiceError> {
        let left = request
            .remaining()
            .ok_or_else(|| ServiceError::bad_request("request carried no deadline"))?;
        self.seen.lock().unwrap().push(left);
        if request.topic == topics::PARSE_RUN {
            Ok(request.reply(&IngestStatus {
                info: "Ok".into(),
                pages: 0,
                records: 0,
            })?)
        } else {
            Ok(request.reply(&PostsResponse { posts: vec![] })?)
        }
    }
}

fn shipped_config() -> RpcConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/postgate.toml");
    assert!(path.exists(), "shipped config missing at {}", path.display());
    RpcConfig::load(path).unwrap()
}

/// Bind both services on test ports and point `rpc` at them, keeping
/// everything else from the loaded config.
async fn serve_both(
    rpc: &mut RpcConfig,
    ports: (u16, u16),
    recorder: Arc<DeadlineRecorder>,
    shutdown: Arc<Notify>,
) {
    for (name, port) in [(PARSE_SERVICE, ports.0), (POST_SERVICE, ports.1)] {
        let transport = Transport::tcp("127.0.0.1", port);
        rpc.services.get_mut(name).unwrap().endpoint = transport.endpoint();
        let server = Arc::new(ZmqRequestServer::bind(&transport).await.unwrap());
        let service: Arc<dyn Service> = recorder.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { ServiceRunner::run(server, service, Some(shutdown)).await });
    }
    tokio::time::sleep(SETTLE).await;
}

async fn effective_deadlines(mut rpc: RpcConfig, ports: (u16, u16)) -> (Duration, Vec<Duration>) {
    let recorder = Arc::new(DeadlineRecorder::default());
    let shutdown = Arc::new(Notify::new());
    serve_both(&mut rpc, ports, recorder.clone(), shutdown.clone()).await;

    let ping = Duration::from_secs(2);
    let parse = connect_backend(&rpc, PARSE_SERVICE, ping).await.unwrap();
    let post = connect_backend(&rpc, POST_SERVICE, ping).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    let request_timeout = Config::from_env().server.request_timeout();
    let app = build_router(AppState::new(
        Arc::new(RpcIngestBackend::new(parse)),
        Arc::new(RpcPostBackend::new(post)),
        request_timeout,
    ));

    for uri in ["/parse", "/posts"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    shutdown.notify_waiters();
    let seen = recorder.seen.lock().unwrap().clone();
    (request_timeout, seen)
}

fn assert_full_deadline(request_timeout: Duration, seen: &[Duration]) {
    assert_eq!(seen.len(), 2);
    for left in seen {
        assert!(*left <= request_timeout, "{left:?} > {request_timeout:?}");
        assert!(
            *left > request_timeout - Duration::from_secs(5),
            "backend got {left:?}, expected close to {request_timeout:?}"
        );
    }
}

#[tokio::test]
async fn shipped_config_keeps_request_deadline() {
    let (request_timeout, seen) = effective_deadlines(shipped_config(), (16900, 16901)).await;
    assert_full_deadline(request_timeout, &seen);
}

#[tokio::test]
async fn local_fallback_keeps_request_deadline() {
    let missing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("no-such-config.toml");
    let (request_timeout, seen) =
        effective_deadlines(RpcConfig::load(missing).unwrap(), (16902, 16903)).await;
    assert_full_deadline(request_timeout, &seen);
}

#[test]
fn default_request_deadline_is_one_minute() {
    if std::env::var("REQUEST_TIMEOUT_SECS").is_err() {
        assert_eq!(
            Config::from_env().server.request_timeout(),
            Duration::from_secs(60)
        );
    }
}
