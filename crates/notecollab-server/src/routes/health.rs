//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Live collaboration rooms.
    pub rooms: usize,
    /// Joined realtime connections.
    pub connections: usize,
}

/// GET /health - Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.registry();
    Json(HealthResponse {
        status: "ok".to_string(),
        rooms: registry.room_count().await,
        connections: registry.connection_count().await,
    })
}

/// Build health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::PendingConnection;
    use crate::routes::test_support::test_state;
    use notecollab_core::{NoteId, PermissionTier};

    #[tokio::test]
    async fn test_health_check() {
        let (state, _store) = test_state().await;
        let response = health_check(State(state.clone())).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.connections, 0);

        let (_conn, _rx) = state
            .registry()
            .join(PendingConnection::new(NoteId(1), PermissionTier::Read))
            .await;
        let response = health_check(State(state)).await;
        assert_eq!((response.rooms, response.connections), (1, 1));
    }
}
