//! gateway: terminates HTTP and forwards every call to the backend services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use postgate_core::config::{load_dotenv, Config};
use postgate_gateway::{
    build_router, connect_backend, AppState, RpcIngestBackend, RpcPostBackend,
};
use postgate_rpc::config::{PARSE_SERVICE, POST_SERVICE};
use postgate_rpc::{shutdown_signal, RpcConfig, ServiceClient};

/// HTTP gateway in front of parse-service and post-service.
#[derive(Parser, Debug)]
#[command(name = "gateway", version, about)]
struct Cli {
    /// Path to the service endpoint config.
    #[arg(long, env = "POSTGATE_CONFIG", default_value = "config/postgate.toml")]
    config: String,

    /// Seconds to wait for each backend's startup ping.
    #[arg(long, env = "GATEWAY_PING_TIMEOUT", default_value_t = 5)]
    ping_timeout: u64,
}

/// Connect to a backend and make sure it answers before serving traffic.
async fn connect(
    rpc: &RpcConfig,
    name: &str,
    ping_timeout: Duration,
) -> anyhow::Result<ServiceClient> {
    connect_backend(rpc, name, ping_timeout)
        .await
        .with_context(|| format!("{name} service is not answering"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate()?;
    config.log_summary();

    let rpc = RpcConfig::load(&cli.config)?;
    let ping_timeout = Duration::from_secs(cli.ping_timeout);
    let parse = connect(&rpc, PARSE_SERVICE, ping_timeout).await?;
    let post = connect(&rpc, POST_SERVICE, ping_timeout).await?;

    let state = AppState::new(
        Arc::new(RpcIngestBackend::new(parse)),
        Arc::new(RpcPostBackend::new(post)),
        config.server.request_timeout(),
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway exited cleanly");
    Ok(())
}
