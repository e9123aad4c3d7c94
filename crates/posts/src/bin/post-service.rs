//! post-service: list, get, update and delete stored records over RPC.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use postgate_core::config::{load_dotenv, Config};
use postgate_posts::RecordService;
use postgate_rpc::config::POST_SERVICE;
use postgate_rpc::{RpcConfig, ServiceRunner, ZmqRequestServer};
use postgate_storage::{init_pool, PgRecordStore};

/// Record service: CRUD access to the post table.
#[derive(Parser, Debug)]
#[command(name = "post-service", version, about)]
struct Cli {
    /// Path to the service endpoint config.
    #[arg(long, env = "POSTGATE_CONFIG", default_value = "config/postgate.toml")]
    config: String,
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
    config.log_summary();

    let rpc = RpcConfig::load(&cli.config)?;
    let transport = rpc.service_transport(POST_SERVICE)?;

    let pool = init_pool(&config.postgres).await?;
    let service = Arc::new(RecordService::new(Arc::new(PgRecordStore::new(pool))));

    let server = Arc::new(ZmqRequestServer::bind(&transport).await?);
    info!(endpoint = %transport, "post-service listening");
    ServiceRunner::run(server, service, None).await?;
    info!("post-service exited cleanly");
    Ok(())
}
