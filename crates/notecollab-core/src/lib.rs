//! notecollab-core: domain types for collaborative note sharing.
//!
//! This crate provides:
//! - Note, user and connection identifiers
//! - The ordered permission tier (`read < write < full`)
//! - Share grants and CSPRNG-backed share tokens
//! - Realtime wire frames exchanged with collaborating clients

pub mod frames;
pub mod token;
pub mod types;

pub use frames::{ClientFrame, EditDelivery, EditFrame, ErrorFrame, JoinedFrame, ServerFrame};
pub use token::ShareToken;
pub use types::{
    ConnectionId, Note, NoteId, PermissionTier, ShareGrant, TierParseError, UserId,
};
