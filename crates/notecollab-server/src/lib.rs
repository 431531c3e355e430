//! notecollab-server: collaborative note sharing gateway
//!
//! This crate provides:
//! - Share token issuance, revocation and collaborator invitations
//! - Permission resolution for owners, token bearers and invited users
//! - Per-note realtime rooms over WebSockets with ordered edit fan-out
//! - Background persistence of the latest edit of each note
//!
//! # Architecture
//!
//! The server is built on Axum with a middleware stack for:
//! - Request tracing and logging
//! - CORS handling
//! - Request ID generation
//! - JSON error responses
//!
//! The collaboration core in [`collab`] is transport-agnostic; [`routes`]
//! adapts it to HTTP and WebSockets.
//!
//! # Usage
//!
//! ```rust,ignore
//! use notecollab_server::{AppState, ServerConfig, build_app};
//!
//! let state = AppState::new(config, notes, grants, persister.handle(), shutdown_rx);
//! let app = build_app(state)?;
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod collab;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::{make_request_span, propagate_request_id, request_id_layer};

// Re-exports for convenience
pub use collab::{CollabError, CollabResult};
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

// Re-export dependent crates
pub use notecollab_core;
pub use notecollab_store;

/// Build the router with the full middleware stack.
pub fn build_app(state: AppState) -> Result<Router, ConfigError> {
    let cors = build_cors_layer(&state.config().cors_allowed_origins)?;

    Ok(routes::build_router(state)
        .layer(axum::middleware::from_fn(propagate_request_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(request_id_layer()))
}

/// Build CORS layer from configuration.
pub fn build_cors_layer(allowed_origins: &str) -> Result<CorsLayer, ConfigError> {
    if allowed_origins.trim() == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    // Parse comma-separated origins
    let origins = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidValue {
                name: "CORS_ALLOWED_ORIGINS".to_string(),
                reason: format!("invalid origin {:?}", s),
            })
        })
        .collect::<Result<Vec<http::HeaderValue>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}
