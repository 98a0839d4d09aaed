//! sampler-api - preset catalog service
//!
//! Serves the preset catalog over HTTP and keeps the sample tree on disk in
//! step with it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sampler_common::config::{
    resolve_root_folder, MetadataBackend, RootFolderInitializer, TomlConfig, ROOT_FOLDER_ENV,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sampler_api::storage::LocalFileStore;
use sampler_api::store::{sqlite, InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use sampler_api::{build_router, sync, AppState, ConsistencyEngine};

/// Command-line arguments for sampler-api
#[derive(Parser, Debug)]
#[command(name = "sampler-api")]
#[command(about = "Preset catalog service for the sampler")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to ~/.config/sampler/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database and the sample tree
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SAMPLER_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config comes first so its log level can seed the filter
    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sampler-api v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root().display());

    let metadata: Arc<dyn MetadataStore> = match config.metadata_backend {
        MetadataBackend::Sqlite => {
            let db_path = initializer.database_path(&config);
            info!("Database path: {}", db_path.display());
            let pool = sqlite::init_database_pool(&db_path).await?;
            Arc::new(
                SqliteMetadataStore::new(pool)
                    .await
                    .context("Failed to initialize metadata store")?,
            )
        }
        MetadataBackend::Memory => {
            warn!("Using in-memory metadata store; the catalog is lost on restart");
            Arc::new(InMemoryMetadataStore::new())
        }
    };

    let data_dir = initializer.data_dir();
    let files = Arc::new(LocalFileStore::new(data_dir.clone()));
    let timeout = Duration::from_millis(config.store_timeout_ms);
    let engine = Arc::new(ConsistencyEngine::new(metadata.clone(), files, timeout));

    let report = sync::synchronize_presets(metadata.as_ref(), config.seed_dir.as_deref(), timeout).await;
    if report.failed > 0 {
        warn!("{} preset definitions failed to sync", report.failed);
    }

    if let Some(secs) = config.audit_interval_secs.filter(|s| *s > 0) {
        spawn_periodic_audit(engine.clone(), Duration::from_secs(secs));
    }

    let state = AppState::new(engine, data_dir, config.max_upload_bytes);
    let app = build_router(state);

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("sampler-api listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Run the drift audit on a fixed interval, logging what it finds
fn spawn_periodic_audit(engine: Arc<ConsistencyEngine>, period: Duration) {
    info!("Drift audit every {}s", period.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick fires immediately; skip it so startup isn't slowed
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = engine.audit().await {
                error!("Drift audit failed: {}", e);
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
