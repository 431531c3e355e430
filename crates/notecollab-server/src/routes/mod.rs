//! Route definitions for the HTTP and WebSocket API.

pub mod collaborate;
pub mod health;
pub mod notes;
pub mod share;

use axum::Router;

use crate::state::AppState;

/// Build the complete router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(share::routes())
        .merge(notes::routes())
        .merge(collaborate::routes())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use notecollab_core::{Note, NoteId, UserId};
    use notecollab_store::MemoryStore;
    use tokio::sync::watch;

    use crate::collab::PersistenceWorker;
    use crate::config::ServerConfig;
    use crate::state::AppState;

    pub const OWNER: UserId = UserId(1);
    pub const NOTE: NoteId = NoteId(7);

    /// State over a memory store seeded with note 7 owned by user 1.
    pub async fn test_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_note(Note::new(NOTE, OWNER, "Plans", "")).await;

        let config = ServerConfig {
            session_secret: "route-test-secret".to_string(),
            ..ServerConfig::default()
        };
        let mut worker =
            PersistenceWorker::new(store.clone(), Duration::from_millis(50), Duration::from_secs(1));
        let persist = worker.handle();
        let _ = worker.start();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = AppState::new(config, store.clone(), store.clone(), persist, shutdown_rx);
        (state, store)
    }
}
