//! Effective permission resolution.
//!
//! Every call reads the stores; nothing is cached, so a revoked token fails
//! on the very next resolution.

use std::sync::Arc;

use notecollab_core::{Note, NoteId, PermissionTier, ShareToken, UserId};
use notecollab_store::{GrantStore, NoteStore, StoreError};

use super::{CollabError, CollabResult};

/// Identity material a request presents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    /// Authenticated user from a valid session.
    pub session: Option<UserId>,
    /// Share token presented as a bearer capability.
    pub token: Option<ShareToken>,
}

impl Evidence {
    pub fn session(user: UserId) -> Self {
        Self {
            session: Some(user),
            token: None,
        }
    }

    pub fn token(token: ShareToken) -> Self {
        Self {
            session: None,
            token: Some(token),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.session.is_none() && self.token.is_none()
    }
}

/// Where a resolved tier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The session belongs to the note owner.
    Owner,
    /// A presented share token.
    Token,
    /// A grant bound to the session's user.
    Collaborator,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tier: PermissionTier,
    pub source: ResolutionSource,
    /// The note resolved against.
    pub note: Note,
}

/// Resolves the tier a viewer holds on a note.
pub struct PermissionResolver {
    notes: Arc<dyn NoteStore>,
    grants: Arc<dyn GrantStore>,
}

impl PermissionResolver {
    pub fn new(notes: Arc<dyn NoteStore>, grants: Arc<dyn GrantStore>) -> Self {
        Self { notes, grants }
    }

    /// Resolve the effective tier for `evidence` on `note_id`.
    ///
    /// The owner always gets `full`. A token yields its grant's tier when the
    /// grant targets this note and, if bound, the session matches its
    /// recipient. A session alone yields the highest grant bound to that
    /// user. Anything else is `Unauthorized`; a missing note is `NotFound`.
    pub async fn resolve(&self, note_id: NoteId, evidence: &Evidence) -> CollabResult<Resolution> {
        if evidence.is_empty() {
            return Err(CollabError::Unauthorized);
        }

        let note = match self.notes.get_note(note_id).await {
            Ok(note) => note,
            Err(StoreError::NoteNotFound(_)) => {
                return Err(CollabError::NotFound(format!("note {}", note_id)));
            }
            Err(e) => return Err(e.into()),
        };

        if evidence.session.is_some_and(|user| note.is_owned_by(user)) {
            return Ok(Resolution {
                tier: PermissionTier::Full,
                source: ResolutionSource::Owner,
                note,
            });
        }

        if let Some(token) = &evidence.token {
            let grant = self
                .grants
                .find_grant(token)
                .await?
                .filter(|g| g.note_id == note_id)
                .ok_or(CollabError::Unauthorized)?;

            if grant.recipient.is_some() && grant.recipient != evidence.session {
                tracing::debug!(note_id = %note_id, "Bound grant presented without matching session");
                return Err(CollabError::Unauthorized);
            }

            return Ok(Resolution {
                tier: grant.tier,
                source: ResolutionSource::Token,
                note,
            });
        }

        let user = evidence.session.ok_or(CollabError::Unauthorized)?;
        let tier = self
            .grants
            .grants_for_recipient(note_id, user)
            .await?
            .into_iter()
            .map(|g| g.tier)
            .max()
            .ok_or(CollabError::Unauthorized)?;

        Ok(Resolution {
            tier,
            source: ResolutionSource::Collaborator,
            note,
        })
    }
}
