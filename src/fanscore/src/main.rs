//! Fanscore: per (user, artist) fan engagement service.
//!
//! Wires configuration, the SQLite store, the notification dispatcher and the
//! engagement engine, then serves the HTTP API until interrupted.

use clap::Parser;
use fanscore_api::ApiServer;
use fanscore_core::{AppConfig, Catalog};
use fanscore_engine::{dispatch, EngagementEngine};
use fanscore_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fanscore")]
#[command(about = "Fan engagement scoring, tiers and rewards per artist")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "FANSCORE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "FANSCORE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// SQLite database URL (overrides config)
    #[arg(long, env = "FANSCORE__DATABASE__URL")]
    database_url: Option<String>,

    /// Achievement and milestone catalog to seed at startup
    #[arg(long, env = "FANSCORE_CATALOG")]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanscore=info,fanscore_engine=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Fanscore starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        database = %config.database.url,
        notifications = config.notifications.enabled,
        "Configuration loaded"
    );

    let store = Arc::new(SqliteStore::connect(&config.database).await?);
    let dispatcher = dispatch::from_config(&config.notifications)?;
    let engine = EngagementEngine::new(&config.scoring, store, dispatcher)?
        .with_channels(config.notifications.channels.clone());

    if let Some(path) = &cli.catalog {
        let catalog = Catalog::load(path)?;
        engine.seed_catalog(&catalog).await?;
        info!(path = %path.display(), "Catalog loaded");
    }

    let engine = Arc::new(engine);
    let api_server = ApiServer::new(config.clone(), engine.clone());

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Fanscore is ready to serve traffic");

    api_server.start_http().await?;
    engine.flush_notifications().await;

    info!("Fanscore shut down");
    Ok(())
}
