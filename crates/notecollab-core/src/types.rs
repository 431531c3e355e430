//! Core data types for collaborative note sharing.
//!
//! This module defines the identifiers, the ordered permission tier, the
//! share grant capability record, and the note view the collaboration core
//! reads from the note store. Note content is an opaque blob: nothing in
//! this crate interprets it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::token::ShareToken;

// ============================================================================
// ID Types
// ============================================================================

/// Identifier of a note, as assigned by the note store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Creates a NoteId from its raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identifier of a user account, as assigned by the account service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Creates a UserId from its raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identifier of a live realtime connection.
///
/// The note id is part of the identifier, so a connection can only ever
/// belong to the room of that note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId {
    /// The note whose room this connection joins.
    pub note_id: NoteId,
    /// Random per-connection component.
    pub id: Uuid,
}

impl ConnectionId {
    /// Creates a fresh connection id for a note.
    #[must_use]
    pub fn new(note_id: NoteId) -> Self {
        Self {
            note_id,
            id: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.note_id, self.id)
    }
}

// ============================================================================
// Permission Types
// ============================================================================

/// Ordered permission level on a note: `read < write < full`.
///
/// `write` allows content edits, `full` additionally allows management
/// operations such as inviting collaborators. Checks are monotonic: an
/// operation requiring a tier succeeds for that tier and every higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    /// View the note and receive live edits.
    Read,
    /// Additionally publish edits.
    Write,
    /// Additionally manage sharing.
    Full,
}

impl PermissionTier {
    /// All tiers in ascending order.
    pub const ALL: [PermissionTier; 3] = [Self::Read, Self::Write, Self::Full];

    /// Whether a holder of this tier may perform an operation requiring `required`.
    #[must_use]
    pub fn allows(self, required: PermissionTier) -> bool {
        self >= required
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionTier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "full" => Ok(Self::Full),
            other => Err(TierParseError(other.to_string())),
        }
    }
}

/// An unrecognized permission tier string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission tier {0:?}: expected \"read\", \"write\" or \"full\"")]
pub struct TierParseError(pub String);

// ============================================================================
// Core Domain Types
// ============================================================================

/// A capability record binding a share token to a note and a tier.
///
/// Grants are never mutated; revocation deletes them. A grant with a
/// `recipient` only admits that authenticated user, a grant without one is
/// an anonymous share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    /// The opaque bearer token.
    pub token: ShareToken,
    /// The note this grant gives access to.
    pub note_id: NoteId,
    /// The tier the grant confers.
    pub tier: PermissionTier,
    /// The user this grant is bound to, if any.
    pub recipient: Option<UserId>,
    /// When the grant was issued.
    pub created_at: DateTime<Utc>,
}

impl ShareGrant {
    /// Creates an anonymous grant with a freshly generated token.
    #[must_use]
    pub fn new(note_id: NoteId, tier: PermissionTier) -> Self {
        Self {
            token: ShareToken::generate(),
            note_id,
            tier,
            recipient: None,
            created_at: Utc::now(),
        }
    }

    /// Binds the grant to a recipient.
    #[must_use]
    pub fn bound_to(mut self, recipient: UserId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Whether this grant is an anonymous share link.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.recipient.is_none()
    }
}

/// A note as seen by the collaboration core.
///
/// Owned by the note store. `content` is an opaque serialized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note identifier.
    pub id: NoteId,
    /// The owning user; always resolves to `full`.
    pub owner: UserId,
    /// Note title.
    pub title: String,
    /// Opaque serialized document.
    pub content: String,
    /// Last content update.
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a note owned by `owner`.
    #[must_use]
    pub fn new(id: NoteId, owner: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            title: title.into(),
            content: content.into(),
            updated_at: Utc::now(),
        }
    }

    /// Whether `user` owns this note.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_is_read_write_full() {
        assert!(PermissionTier::Read < PermissionTier::Write);
        assert!(PermissionTier::Write < PermissionTier::Full);
    }

    #[test]
    fn tier_checks_are_monotonic() {
        for held in PermissionTier::ALL {
            for required in PermissionTier::ALL {
                assert_eq!(held.allows(required), held >= required);
            }
        }
        assert!(PermissionTier::Full.allows(PermissionTier::Read));
        assert!(PermissionTier::Full.allows(PermissionTier::Write));
        assert!(!PermissionTier::Read.allows(PermissionTier::Write));
    }

    #[test]
    fn tier_parses_canonical_names_only() {
        assert_eq!("read".parse::<PermissionTier>(), Ok(PermissionTier::Read));
        assert_eq!("write".parse::<PermissionTier>(), Ok(PermissionTier::Write));
        assert_eq!("full".parse::<PermissionTier>(), Ok(PermissionTier::Full));
        assert!("admin".parse::<PermissionTier>().is_err());
        assert!("Read".parse::<PermissionTier>().is_err());
        assert!("".parse::<PermissionTier>().is_err());
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&PermissionTier::Write).unwrap();
        assert_eq!(json, "\"write\"");
        let parsed: PermissionTier = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(parsed, PermissionTier::Full);
    }

    #[test]
    fn note_id_is_transparent_in_json() {
        assert_eq!(serde_json::to_string(&NoteId(42)).unwrap(), "42");
        assert_eq!("7".parse::<NoteId>().unwrap(), NoteId(7));
    }

    #[test]
    fn connection_id_carries_note() {
        let a = ConnectionId::new(NoteId(7));
        let b = ConnectionId::new(NoteId(7));
        assert_eq!(a.note_id, NoteId(7));
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("7:"));
    }

    #[test]
    fn grant_binding() {
        let grant = ShareGrant::new(NoteId(1), PermissionTier::Read);
        assert!(grant.is_anonymous());
        let bound = grant.bound_to(UserId(9));
        assert_eq!(bound.recipient, Some(UserId(9)));
        assert!(!bound.is_anonymous());
    }

    #[test]
    fn note_ownership() {
        let note = Note::new(NoteId(1), UserId(3), "Title", "body");
        assert!(note.is_owned_by(UserId(3)));
        assert!(!note.is_owned_by(UserId(4)));
    }
}
