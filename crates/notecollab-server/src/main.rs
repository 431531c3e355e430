//! Entry point for the notecollab-server binary.

use std::sync::Arc;
use std::time::Duration;

use notecollab_server::{
    AppState, ServerConfig, build_app,
    collab::{ConnectionRegistry, PersistenceWorker},
};
use notecollab_store::{GrantStore, MemoryStore, NoteStore, PgStore, StoreConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    tracing::info!("Starting notecollab-server");
    tracing::info!(
        port = config.port,
        log_level = %config.log_level,
        dev_identity = config.allow_dev_identity,
        "Configuration loaded"
    );
    if config.allow_dev_identity {
        tracing::warn!("X-User-Id is accepted as a session; do not run this in production");
    }

    // Pick the storage collaborators
    let (notes, grants): (Arc<dyn NoteStore>, Arc<dyn GrantStore>) = match &config.database_url {
        Some(_) => {
            let store = Arc::new(PgStore::connect(StoreConfig::from_env()?).await?);
            tracing::info!("Connected to database");
            let notes: Arc<dyn NoteStore> = store.clone();
            let grants: Arc<dyn GrantStore> = store;
            (notes, grants)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = Arc::new(MemoryStore::new());
            let notes: Arc<dyn NoteStore> = store.clone();
            let grants: Arc<dyn GrantStore> = store;
            (notes, grants)
        }
    };

    // Start the persistence worker
    let mut persister =
        PersistenceWorker::new(notes.clone(), config.persist_quiescence, config.persist_max_delay);
    let persist_task = persister.start()?;

    // Build application state
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(config.clone(), notes, grants, persister.handle(), shutdown_rx);
    let registry = state.registry().clone();

    let app = build_app(state)?;

    // Create listener
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    drain_connections(&registry, config.leave_timeout).await;

    persister.shutdown();
    persist_task.await?;

    let stats = persister.stats();
    tracing::info!(
        writes = stats.writes,
        failures = stats.failures,
        "Server shutdown complete"
    );
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Give open WebSocket connections time to close and leave their rooms.
async fn drain_connections(registry: &ConnectionRegistry, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let open = registry.connection_count().await;
        if open == 0 {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(open, "Connections still open at shutdown");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
