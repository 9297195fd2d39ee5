//! flake-indexer server entry point.
//!
//! Opens the view store, starts the projector, optionally replays an
//! event file, and serves the REST API until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use flake_indexer::api;
use flake_indexer::app_state::AppState;
use flake_indexer::config::{IndexerConfig, LogFormat, StoreBackend};
use flake_indexer::pipeline::{DeadLetterLog, Projector};
use flake_indexer::projection::ProjectionEngine;
use flake_indexer::service::QueryService;
use flake_indexer::source::{
    AccountReader, HttpAccountReader, StaticAccountReader, replay_file,
};
use flake_indexer::store::{
    FileViewStore, InMemoryViewStore, PostgresViewStore, ViewStore, Views,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = IndexerConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, backend = ?config.store_backend, "starting flake-indexer");

    // Build storage layer
    let store = open_store(&config).await?;
    let views = Views::new(store, config.io_timeout);

    // Build projection layer
    let accounts = account_reader(&config).await?;
    let engine = ProjectionEngine::new(views.clone(), accounts, config.engine_settings());
    let dead_letters = DeadLetterLog::in_dir(&config.data_dir);
    let projector = Projector::new(engine, dead_letters, config.projector_settings());

    let (ingest, events) = mpsc::channel(config.event_queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let projector_task = tokio::spawn(projector.run(events, shutdown_rx));

    if let Some(path) = config.event_replay_file.clone() {
        let sink = ingest.clone();
        tokio::spawn(async move {
            if let Err(e) = replay_file(&path, &sink).await {
                tracing::error!(path = %path.display(), error = %e, "event replay failed");
            }
        });
    }

    // Build application state
    let app_state = AppState {
        query_service: Arc::new(QueryService::new(views)),
        ingest,
    };

    // Build router
    let app = api::build_app(app_state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    // Stop intake and let the projector flush
    let _ = shutdown_tx.send(true);
    let stats = projector_task.await.context("projector task panicked")?;
    tracing::info!(applied = stats.applied, dead_lettered = stats.dead_lettered, "flake-indexer stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn open_store(config: &IndexerConfig) -> anyhow::Result<Arc<dyn ViewStore>> {
    let store: Arc<dyn ViewStore> = match config.store_backend {
        StoreBackend::File => Arc::new(
            FileViewStore::open(config.data_dir.join("views"))
                .await
                .context("failed to open file view store")?,
        ),
        StoreBackend::Postgres => Arc::new(
            PostgresViewStore::connect(&config.postgres_settings())
                .await
                .context("failed to connect postgres view store")?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("in-memory view store: views are lost on restart");
            Arc::new(InMemoryViewStore::new())
        }
    };
    Ok(store)
}

async fn account_reader(config: &IndexerConfig) -> anyhow::Result<Arc<dyn AccountReader>> {
    if let Some(url) = &config.account_rpc_url {
        let reader = HttpAccountReader::new(url, config.io_timeout)
            .context("failed to build account RPC client")?;
        tracing::info!(url = %url, "reading pair accounts over HTTP");
        return Ok(Arc::new(reader));
    }
    if let Some(path) = &config.accounts_file {
        let reader = StaticAccountReader::from_file(path)
            .await
            .with_context(|| format!("failed to load accounts from {}", path.display()))?;
        tracing::info!(path = %path.display(), "reading pair accounts from file");
        return Ok(Arc::new(reader));
    }
    tracing::warn!("no ACCOUNT_RPC_URL or ACCOUNTS_FILE; pair creations will be deferred");
    Ok(Arc::new(StaticAccountReader::new()))
}
