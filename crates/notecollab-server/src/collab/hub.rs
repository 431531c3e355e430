//! Broadcast hub: sequences edits and fans them out to a room.
//!
//! Sequence assignment and enqueueing happen under the room mutex with
//! non-blocking sends, so every receiver sees the same order with no gaps
//! and a publisher never waits on another client's socket. A member whose
//! queue is full or closed is evicted on the spot; dropping its sender ends
//! its outbound stream once the queued deliveries drain.

use std::sync::Arc;

use notecollab_core::{ConnectionId, NoteId, PermissionTier};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;

use super::persist::PersistHandle;
use super::registry::{ConnectionRegistry, Delivery, JoinedConnection};
use super::{CollabError, CollabResult, require_tier};

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Sequence number assigned to the edit.
    pub sequence: u64,
    /// Members the edit was enqueued for.
    pub delivered: usize,
    /// Members evicted because their queue was full or closed.
    pub evicted: Vec<ConnectionId>,
}

/// Fans edits out to room members and feeds the persistence worker.
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    persist: PersistHandle,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>, persist: PersistHandle) -> Self {
        Self { registry, persist }
    }

    /// Publish an edit from `sender` to every other member of its room.
    ///
    /// Requires `write`. Fails with `TransportClosed` if the sender is no
    /// longer a member.
    pub async fn publish(
        &self,
        sender: &JoinedConnection,
        payload: Value,
    ) -> CollabResult<PublishReceipt> {
        require_tier(sender.tier, PermissionTier::Write)?;

        let note_id = sender.note_id();
        let room = self
            .registry
            .room(note_id)
            .await
            .ok_or(CollabError::TransportClosed)?;
        let payload = Arc::new(payload);

        let receipt = {
            let mut state = room.lock().await;
            if !state.members.contains_key(&sender.id) {
                return Err(CollabError::TransportClosed);
            }

            state.last_sequence += 1;
            let delivery = Delivery {
                note_id,
                origin: sender.id,
                sequence: state.last_sequence,
                payload: payload.clone(),
            };

            let mut delivered = 0;
            let mut evicted = Vec::new();
            for (id, member) in state.members.iter() {
                if *id == sender.id {
                    continue;
                }
                match member.outbound.try_send(delivery.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            note_id = %note_id,
                            connection_id = %id,
                            "Outbound queue full, evicting slow consumer"
                        );
                        evicted.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(
                            note_id = %note_id,
                            connection_id = %id,
                            "Outbound queue closed, evicting"
                        );
                        evicted.push(*id);
                    }
                }
            }
            for id in &evicted {
                state.members.remove(id);
            }

            PublishReceipt {
                sequence: delivery.sequence,
                delivered,
                evicted,
            }
        };

        self.persist.submit(note_id, payload);

        tracing::debug!(
            note_id = %note_id,
            connection_id = %sender.id,
            sequence = receipt.sequence,
            delivered = receipt.delivered,
            "Edit broadcast"
        );
        Ok(receipt)
    }

    /// Ask the persistence worker to write the note's pending edit now.
    pub fn flush(&self, note_id: NoteId) {
        self.persist.flush(note_id);
    }
}
