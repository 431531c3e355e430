//! Share token issuance and revocation.

use std::sync::Arc;

use notecollab_core::{Note, NoteId, PermissionTier, ShareGrant, ShareToken, UserId};
use notecollab_store::{GrantStore, NoteStore, StoreError};

use super::notify::Notifier;
use super::{CollabError, CollabResult};

/// Attempts before giving up on a token collision streak.
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Mints, lists and revokes share grants on behalf of note owners.
pub struct TokenIssuer {
    notes: Arc<dyn NoteStore>,
    grants: Arc<dyn GrantStore>,
    notifier: Arc<dyn Notifier>,
}

impl TokenIssuer {
    pub fn new(
        notes: Arc<dyn NoteStore>,
        grants: Arc<dyn GrantStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            notes,
            grants,
            notifier,
        }
    }

    /// Issue a grant for `note_id` at `tier`, optionally bound to `recipient`.
    ///
    /// Fails with `NotFound` if the note does not exist and `NotOwner` if
    /// `requester` does not own it.
    pub async fn issue(
        &self,
        note_id: NoteId,
        requester: UserId,
        tier: PermissionTier,
        recipient: Option<UserId>,
    ) -> CollabResult<ShareGrant> {
        let note = self.owned_note(note_id, requester).await?;

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let mut grant = ShareGrant::new(note.id, tier);
            if let Some(user) = recipient {
                grant = grant.bound_to(user);
            }

            match self.grants.insert_grant(&grant).await {
                Ok(()) => {
                    tracing::info!(
                        note_id = %note_id,
                        permission = %tier,
                        bound = recipient.is_some(),
                        token = %grant.token.redacted(),
                        "Share grant issued"
                    );
                    return Ok(grant);
                }
                Err(StoreError::DuplicateToken) => {
                    tracing::warn!(note_id = %note_id, attempt, "Share token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::DuplicateToken.into())
    }

    /// Revoke a grant. Absent grants and grants on notes the requester does
    /// not own both report `NotFound`.
    pub async fn revoke(&self, token: &ShareToken, requester: UserId) -> CollabResult<ShareGrant> {
        let not_found = || CollabError::NotFound("share token".to_string());

        let grant = self.grants.find_grant(token).await?.ok_or_else(not_found)?;

        match self.notes.get_note(grant.note_id).await {
            Ok(note) if note.is_owned_by(requester) => {}
            Ok(_) | Err(StoreError::NoteNotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        if !self.grants.delete_grant(token).await? {
            return Err(not_found());
        }

        tracing::info!(
            note_id = %grant.note_id,
            token = %token.redacted(),
            "Share grant revoked"
        );
        Ok(grant)
    }

    /// All grants on a note, oldest first. Owner only.
    pub async fn list(&self, note_id: NoteId, requester: UserId) -> CollabResult<Vec<ShareGrant>> {
        self.owned_note(note_id, requester).await?;
        Ok(self.grants.list_grants(note_id).await?)
    }

    /// Issue a grant bound to `recipient` and notify them.
    pub async fn invite(
        &self,
        note_id: NoteId,
        requester: UserId,
        recipient: UserId,
        tier: PermissionTier,
    ) -> CollabResult<ShareGrant> {
        let grant = self.issue(note_id, requester, tier, Some(recipient)).await?;

        match self.notes.get_note(note_id).await {
            Ok(note) => {
                if let Err(e) = self.notifier.notify_invite(&note, &grant).await {
                    tracing::warn!(note_id = %note_id, error = %e, "Invitation notification failed");
                }
            }
            Err(e) => {
                tracing::warn!(note_id = %note_id, error = %e, "Skipping invitation notification");
            }
        }

        Ok(grant)
    }

    async fn owned_note(&self, note_id: NoteId, requester: UserId) -> CollabResult<Note> {
        let note = match self.notes.get_note(note_id).await {
            Ok(note) => note,
            Err(StoreError::NoteNotFound(_)) => {
                return Err(CollabError::NotFound(format!("note {}", note_id)));
            }
            Err(e) => return Err(e.into()),
        };

        if !note.is_owned_by(requester) {
            return Err(CollabError::NotOwner);
        }
        Ok(note)
    }
}
