//! Out-of-band invitation notifications.

use async_trait::async_trait;
use notecollab_core::{Note, ShareGrant};

/// Notification delivery failure.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Tells a collaborator they were invited to a note.
///
/// Delivery is best effort: a failing notifier never fails the invitation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_invite(&self, note: &Note, grant: &ShareGrant) -> Result<(), NotifyError>;
}

/// Notifier that only records the invitation in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_invite(&self, note: &Note, grant: &ShareGrant) -> Result<(), NotifyError> {
        tracing::info!(
            note_id = %note.id,
            recipient = ?grant.recipient,
            permission = %grant.tier,
            token = %grant.token.redacted(),
            "Collaborator invited"
        );
        Ok(())
    }
}
