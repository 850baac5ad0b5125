//! segid-svc - Segment-sampled track identification service
//!
//! Accepts a media URL, samples short windows of its audio, identifies the
//! music in them and serves the results over HTTP + SSE.

use anyhow::{Context, Result};
use clap::Parser;
use segid_common::events::EventBus;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use segid_svc::config::{load_config, Cli};
use segid_svc::extractors::{AuddRecognizer, CommandLineSource, MediaTools};
use segid_svc::services::{JobStore, Pipeline, Reaper};
use segid_svc::storage::FsArtifactStore;
use segid_svc::types::{ArtifactStore, AssetSource, Recognizer};
use segid_svc::AppState;

/// Event bus capacity per subscriber
const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level (which already honours SEGID_LOG)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting segid-svc (track identification) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let artifact_dir = config.resolve_artifact_dir();
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::open(&artifact_dir)
            .with_context(|| format!("Failed to open artifact directory {}", artifact_dir.display()))?,
    );
    info!("Artifacts: {}", artifact_dir.display());

    let tools = MediaTools::resolve()
        .await
        .context("External media tools unavailable")?;
    let source: Arc<dyn AssetSource> = Arc::new(CommandLineSource::new(tools));

    if config.recognition.api_token.is_none() {
        warn!("No recognition API token configured; every window will report no track");
    }
    let recognizer: Arc<dyn Recognizer> = Arc::new(
        AuddRecognizer::new(
            config.recognition.endpoint.clone(),
            config.recognition.api_token.clone(),
            config.recognition.timeout(),
        )
        .context("Failed to create recognition client")?,
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let jobs = Arc::new(JobStore::new(event_bus.clone()));
    let pipeline = Arc::new(Pipeline::new(
        &config,
        source,
        recognizer,
        Arc::clone(&artifacts),
        jobs,
        event_bus.clone(),
    ));

    let shutdown = CancellationToken::new();
    let reaper = Reaper::new(
        Arc::clone(&artifacts),
        config.artifact_max_age(),
        config.cleanup_interval(),
    )
    .spawn(shutdown.clone());

    let state = AppState::new(pipeline, artifacts, event_bus);
    let app = segid_svc::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        warn!("Artifact reaper ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
