//! Database models for the PostgreSQL store.
//!
//! These types map directly to database rows and are used for
//! sqlx queries. Conversions into the notecollab-core domain types live
//! here so the store itself only deals with rows.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use notecollab_core::{Note, NoteId, PermissionTier, ShareGrant, ShareToken, UserId};

use crate::error::StoreError;

/// Database row for the `notes` table.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: NoteId(row.id),
            owner: UserId(row.owner_id),
            title: row.title,
            content: row.content,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for the `share_grants` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShareGrantRow {
    pub token: String,
    pub note_id: i64,
    /// One of `read`, `write`, `full` (enforced by a CHECK constraint).
    pub tier: String,
    pub recipient_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ShareGrantRow> for ShareGrant {
    type Error = StoreError;

    fn try_from(row: ShareGrantRow) -> Result<Self, Self::Error> {
        let tier: PermissionTier = row
            .tier
            .parse()
            .map_err(|e| StoreError::InvalidRow(format!("share_grants.tier: {}", e)))?;

        Ok(ShareGrant {
            token: ShareToken::from_string(row.token),
            note_id: NoteId(row.note_id),
            tier,
            recipient: row.recipient_id.map(UserId),
            created_at: row.created_at,
        })
    }
}
