//! Storage seams consumed by the collaboration core.
//!
//! Note persistence and grant persistence are external collaborators: the
//! core only ever talks to them through these two traits, so the server can
//! run against PostgreSQL in production and the in-memory store in tests.

use async_trait::async_trait;
use notecollab_core::{Note, NoteId, ShareGrant, ShareToken, UserId};

use crate::error::StoreResult;

/// Narrow view of the note store.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch a note. Returns `StoreError::NoteNotFound` if it does not exist.
    async fn get_note(&self, id: NoteId) -> StoreResult<Note>;

    /// Check if a note exists.
    async fn note_exists(&self, id: NoteId) -> StoreResult<bool>;

    /// Replace a note's content and bump its update timestamp.
    ///
    /// Returns `StoreError::NoteNotFound` if the note was deleted.
    async fn update_content(&self, id: NoteId, content: &str) -> StoreResult<()>;
}

/// Persistence for share grants.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Insert a new grant. Returns `StoreError::DuplicateToken` if the token
    /// is already in use.
    async fn insert_grant(&self, grant: &ShareGrant) -> StoreResult<()>;

    /// Look up the grant for a token.
    async fn find_grant(&self, token: &ShareToken) -> StoreResult<Option<ShareGrant>>;

    /// Delete the grant for a token. Returns whether a grant was removed.
    async fn delete_grant(&self, token: &ShareToken) -> StoreResult<bool>;

    /// All grants for a note, oldest first.
    async fn list_grants(&self, note_id: NoteId) -> StoreResult<Vec<ShareGrant>>;

    /// Grants for a note that are bound to `recipient`.
    async fn grants_for_recipient(
        &self,
        note_id: NoteId,
        recipient: UserId,
    ) -> StoreResult<Vec<ShareGrant>>;
}
