//! In-memory store.
//!
//! Implements both [`NoteStore`] and [`GrantStore`] on top of hash maps.
//! Used when no `DATABASE_URL` is configured and throughout the test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use notecollab_core::{Note, NoteId, ShareGrant, ShareToken, UserId};

use crate::error::{StoreError, StoreResult};
use crate::repository::{GrantStore, NoteStore};

/// Hash-map backed note and grant store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: RwLock<HashMap<NoteId, Note>>,
    grants: RwLock<HashMap<ShareToken, ShareGrant>>,
    /// Number of successful `update_content` calls.
    content_writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a note.
    pub async fn insert_note(&self, note: Note) {
        self.notes.write().await.insert(note.id, note);
    }

    /// Remove a note. Returns whether it existed.
    pub async fn remove_note(&self, id: NoteId) -> bool {
        self.notes.write().await.remove(&id).is_some()
    }

    /// Number of content writes performed so far.
    pub fn content_writes(&self) -> u64 {
        self.content_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn get_note(&self, id: NoteId) -> StoreResult<Note> {
        self.notes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NoteNotFound(id))
    }

    async fn note_exists(&self, id: NoteId) -> StoreResult<bool> {
        Ok(self.notes.read().await.contains_key(&id))
    }

    async fn update_content(&self, id: NoteId, content: &str) -> StoreResult<()> {
        let mut notes = self.notes.write().await;
        let note = notes.get_mut(&id).ok_or(StoreError::NoteNotFound(id))?;
        note.content = content.to_string();
        note.updated_at = Utc::now();
        self.content_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn insert_grant(&self, grant: &ShareGrant) -> StoreResult<()> {
        let mut grants = self.grants.write().await;
        if grants.contains_key(&grant.token) {
            return Err(StoreError::DuplicateToken);
        }
        grants.insert(grant.token.clone(), grant.clone());
        Ok(())
    }

    async fn find_grant(&self, token: &ShareToken) -> StoreResult<Option<ShareGrant>> {
        Ok(self.grants.read().await.get(token).cloned())
    }

    async fn delete_grant(&self, token: &ShareToken) -> StoreResult<bool> {
        Ok(self.grants.write().await.remove(token).is_some())
    }

    async fn list_grants(&self, note_id: NoteId) -> StoreResult<Vec<ShareGrant>> {
        let mut grants: Vec<ShareGrant> = self
            .grants
            .read()
            .await
            .values()
            .filter(|g| g.note_id == note_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn grants_for_recipient(
        &self,
        note_id: NoteId,
        recipient: UserId,
    ) -> StoreResult<Vec<ShareGrant>> {
        Ok(self
            .list_grants(note_id)
            .await?
            .into_iter()
            .filter(|g| g.recipient == Some(recipient))
            .collect())
    }
}
