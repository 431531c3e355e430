//! Collaboration core: share tokens, permission resolution, rooms and
//! live edit fan-out.
//!
//! ## Architecture
//!
//! - [`TokenIssuer`]: mints, revokes and lists share grants
//! - [`PermissionResolver`]: turns request evidence into a permission tier
//! - [`ConnectionRegistry`]: per-note rooms of joined connections
//! - [`BroadcastHub`]: sequences edits and fans them out to a room
//! - [`PersistenceWorker`]: writes the latest edit of each note in the background
//!
//! Nothing here knows about HTTP or WebSockets; the gateway in `routes`
//! drives these components.

pub mod hub;
pub mod issuer;
pub mod notify;
pub mod persist;
pub mod registry;
pub mod resolver;

use notecollab_core::PermissionTier;
use notecollab_store::StoreError;

pub use hub::{BroadcastHub, PublishReceipt};
pub use issuer::TokenIssuer;
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use persist::{PersistHandle, PersistStats, PersistenceWorker};
pub use registry::{
    ConnectionRegistry, ConnectionState, Delivery, JoinedConnection, MemberSnapshot,
    PendingConnection,
};
pub use resolver::{Evidence, PermissionResolver, Resolution, ResolutionSource};

/// Errors produced by the collaboration core.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// No usable evidence, or the evidence does not grant access.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller's tier is below what the operation requires.
    #[error("operation requires {required} permission, connection has {actual}")]
    Forbidden {
        required: PermissionTier,
        actual: PermissionTier,
    },

    /// The note or grant does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requester does not own the note.
    #[error("only the note owner may do this")]
    NotOwner,

    /// Unrecognized permission tier.
    #[error("invalid permission tier: {0}")]
    InvalidTier(String),

    /// The connection is no longer a member of its room.
    #[error("connection closed")]
    TransportClosed,

    /// Storage collaborator failure.
    #[error("persistence error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for collaboration operations.
pub type CollabResult<T> = Result<T, CollabError>;

impl CollabError {
    /// Short machine-readable code used in WebSocket error frames.
    pub fn frame_code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } | Self::NotOwner => "forbidden",
            Self::TransportClosed => "closed",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidTier(_) => "bad_frame",
            Self::Storage(_) => "internal",
        }
    }
}

/// Fail with `Forbidden` unless `actual` allows `required`.
pub fn require_tier(actual: PermissionTier, required: PermissionTier) -> CollabResult<()> {
    if actual.allows(required) {
        Ok(())
    } else {
        Err(CollabError::Forbidden { required, actual })
    }
}
