//! # FieldStock Sync Agent
//!
//! Headless process that keeps the device queue flowing to the backend.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize logging (RUST_LOG, default info,fieldstock=debug)       │
//! │  2. Load SyncConfig (FIELDSTOCK_CONFIG or platform config dir)         │
//! │  3. Open the database (FIELDSTOCK_DB_PATH or platform data dir)        │
//! │  4. Build backend, monitor, session, engine                            │
//! │  5. Start the agent, wait for Ctrl+C / SIGTERM, shut down              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fieldstock_db::{Database, DbConfig};
use fieldstock_sync::{
    ConnectivityMonitor, HttpRemoteBackend, OnlineStatus, SessionProvider, StaticSession,
    SyncAgent, SyncConfig, SyncEngine, SyncEventEmitter, SyncQueueState,
};

/// Forwards sync events to the log.
struct LogEmitter;

impl SyncEventEmitter for LogEmitter {
    fn emit_queue_state(&self, state: &SyncQueueState) {
        info!(
            queue_count = state.queue_count,
            is_syncing = state.is_syncing,
            "Queue state"
        );
    }

    fn emit_online_status(&self, status: &OnlineStatus) {
        info!(
            is_online = status.is_online,
            was_offline = status.was_offline,
            "Online status"
        );
    }

    fn emit_error(&self, message: &str) {
        error!(message, "Sync error");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting FieldStock sync agent");

    let config_path = std::env::var("FIELDSTOCK_CONFIG").ok().map(PathBuf::from);
    let config = SyncConfig::load(config_path)?;
    info!(
        device_id = %config.device_id(),
        backend = %config.base_url(),
        "Configuration loaded"
    );

    let db_path = database_path()?;
    info!(?db_path, "Database path determined");
    let db = Database::new(DbConfig::new(db_path)).await?;

    let emitter: Arc<dyn SyncEventEmitter> = Arc::new(LogEmitter);
    let remote = Arc::new(HttpRemoteBackend::from_config(&config)?);
    let monitor = Arc::new(ConnectivityMonitor::with_emitter(
        remote.clone(),
        config.connectivity.clone(),
        emitter.clone(),
    ));
    let session = Arc::new(StaticSession::from_config(&config.session));
    if session.current_user_id().is_none() {
        warn!("No user configured; movements stay queued until one signs in");
    }

    let engine = Arc::new(
        SyncEngine::new(
            db.clone(),
            remote,
            session,
            monitor.subscribe(),
            config.sync.clone(),
        )
        .with_emitter(emitter),
    );
    let pending = engine.refresh_queue_count().await?;
    info!(pending, "Queue loaded");

    let mut agent = SyncAgent::new(engine, monitor, config.sync.clone());
    agent.start();

    shutdown_signal().await?;

    agent.shutdown().await;
    db.close().await;
    info!("Sync agent shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fieldstock=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Database file location.
///
/// `FIELDSTOCK_DB_PATH` overrides the platform data directory.
fn database_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("FIELDSTOCK_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let path = SyncConfig::default_database_path()
        .ok_or("Could not determine app data directory")?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(path)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    Ok(())
}
