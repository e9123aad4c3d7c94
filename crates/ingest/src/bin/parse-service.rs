//! parse-service: answers `svc.parse.run` by ingesting every feed page into
//! PostgreSQL.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use postgate_core::config::{load_dotenv, Config};
use postgate_ingest::{HttpFeed, IngestService, Ingestor};
use postgate_rpc::config::PARSE_SERVICE;
use postgate_rpc::{RpcConfig, ServiceRunner, ZmqRequestServer};
use postgate_storage::{ensure_schema, init_pool, PgRecordStore};

// ── CLI ─────────────────────────────────────────────────────────────

/// Ingestion service: fans out over the feed and stores every record.
#[derive(Parser, Debug)]
#[command(name = "parse-service", version, about)]
struct Cli {
    /// Path to the service endpoint config.
    #[arg(long, env = "POSTGATE_CONFIG", default_value = "config/postgate.toml")]
    config: String,

    /// Override the number of pages fetched per run.
    #[arg(long, env = "INGEST_TOTAL_PAGES")]
    pages: Option<u32>,
}

// ── main ────────────────────────────────────────────────────────────

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

    let mut config = Config::from_env();
    if let Some(pages) = cli.pages {
        config.ingest.total_pages = pages;
    }
    config.validate()?;
    config.log_summary();

    let rpc = RpcConfig::load(&cli.config)?;
    let transport = rpc.service_transport(PARSE_SERVICE)?;

    let pool = init_pool(&config.postgres).await?;
    ensure_schema(&pool).await?;
    let store = Arc::new(PgRecordStore::new(pool));
    let feed = Arc::new(HttpFeed::from_config(&config.ingest)?);
    let service = Arc::new(IngestService::new(Ingestor::new(feed, store, &config.ingest)));

    let server = Arc::new(ZmqRequestServer::bind(&transport).await?);
    info!(endpoint = %transport, "parse-service listening");
    ServiceRunner::run(server, service, None).await?;
    info!("parse-service exited cleanly");
    Ok(())
}
