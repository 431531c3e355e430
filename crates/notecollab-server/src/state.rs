//! Application state shared across handlers.

use std::sync::Arc;

use notecollab_store::{GrantStore, NoteStore};
use tokio::sync::watch;

use crate::collab::{
    BroadcastHub, ConnectionRegistry, LogNotifier, Notifier, PermissionResolver, PersistHandle,
    TokenIssuer,
};
use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Note storage collaborator.
    notes: Arc<dyn NoteStore>,
    /// Share grant storage collaborator.
    grants: Arc<dyn GrantStore>,
    /// Server configuration.
    config: Arc<ServerConfig>,
    issuer: Arc<TokenIssuer>,
    resolver: Arc<PermissionResolver>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    /// Flipped to `true` when the server starts shutting down.
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Wire the collaboration core on top of the given stores.
    ///
    /// `persist` is the handle of an already constructed persistence worker;
    /// `shutdown` tells open WebSocket connections to close.
    pub fn new(
        config: ServerConfig,
        notes: Arc<dyn NoteStore>,
        grants: Arc<dyn GrantStore>,
        persist: PersistHandle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.outbound_queue_capacity));
        Self {
            issuer: Arc::new(TokenIssuer::new(
                notes.clone(),
                grants.clone(),
                Arc::new(LogNotifier),
            )),
            resolver: Arc::new(PermissionResolver::new(notes.clone(), grants.clone())),
            hub: Arc::new(BroadcastHub::new(registry.clone(), persist)),
            registry,
            notes,
            grants,
            config: Arc::new(config),
            shutdown,
        }
    }

    /// Replace the invitation notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.issuer = Arc::new(TokenIssuer::new(
            self.notes.clone(),
            self.grants.clone(),
            notifier,
        ));
        self
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// A fresh receiver for the shutdown signal.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
