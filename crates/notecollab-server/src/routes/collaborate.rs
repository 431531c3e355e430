//! Realtime collaboration over WebSockets.
//!
//! `GET /collaborate/{id}` resolves the caller's tier before admitting the
//! connection. Rejected callers still get the upgrade and are closed right
//! away with a reason code, so browser clients can tell why.
//!
//! An admitted connection runs two tasks. The reader turns inbound frames
//! into hub calls and records when the peer was last heard from; the writer
//! drains the connection's outbound queue, sends error frames produced by the
//! reader, pings, and closes the socket on eviction, server shutdown, or when
//! nothing (not even a pong) arrived for two heartbeat intervals. When either
//! task ends the connection leaves its room.

use axum::{
    Router,
    body::Bytes,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use notecollab_core::frames::{
    CLOSE_GOING_AWAY, CLOSE_IDLE_TIMEOUT, CLOSE_NOT_FOUND, CLOSE_SLOW_CONSUMER, CLOSE_UNAUTHORIZED,
};
use notecollab_core::{ClientFrame, ErrorFrame, JoinedFrame, NoteId, PermissionTier, ServerFrame};

use crate::collab::{CollabError, JoinedConnection, PendingConnection, require_tier};
use crate::error::ApiError;
use crate::extract::SocketEvidence;
use crate::state::AppState;

/// Close code for unexpected server-side failures.
const CLOSE_INTERNAL: u16 = 1011;

/// Why a connection was turned away before joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rejection {
    code: u16,
    reason: &'static str,
}

impl Rejection {
    const UNAUTHORIZED: Self = Self {
        code: CLOSE_UNAUTHORIZED,
        reason: "unauthorized",
    };
    const NOT_FOUND: Self = Self {
        code: CLOSE_NOT_FOUND,
        reason: "not_found",
    };
    const INTERNAL: Self = Self {
        code: CLOSE_INTERNAL,
        reason: "internal",
    };
}

/// GET /collaborate/{id} - Join the note's room.
///
/// Evidence: `Authorization` / `X-Share-Token` headers, or `?session=` /
/// `?token=` query parameters.
///
/// # Close codes
///
/// - 4401 `unauthorized`: No or invalid evidence (also for missing notes
///   unless a valid session was presented)
/// - 4404 `not_found`: Note missing, caller has a valid session
/// - 4408 `slow_consumer`: Evicted for not draining deliveries
/// - 4409 `idle_timeout`: Nothing received for two heartbeat intervals
/// - 1001 `going_away`: Server shutting down
async fn collaborate(
    State(state): State<AppState>,
    Path(note_id): Path<NoteId>,
    evidence: Result<SocketEvidence, ApiError>,
    ws: WebSocketUpgrade,
) -> Response {
    let admission = admit(&state, note_id, evidence).await;

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(tier) => run_connection(socket, state, note_id, tier).await,
            Err(rejection) => reject(socket, note_id, rejection).await,
        }
    })
}

async fn admit(
    state: &AppState,
    note_id: NoteId,
    evidence: Result<SocketEvidence, ApiError>,
) -> Result<PermissionTier, Rejection> {
    let SocketEvidence(evidence) = evidence.map_err(|_| Rejection::UNAUTHORIZED)?;

    match state.resolver().resolve(note_id, &evidence).await {
        Ok(resolution) => Ok(resolution.tier),
        Err(CollabError::NotFound(_)) if evidence.session.is_some() => Err(Rejection::NOT_FOUND),
        Err(CollabError::Storage(e)) => {
            tracing::error!(note_id = %note_id, error = %e, "Resolution failed");
            Err(Rejection::INTERNAL)
        }
        Err(_) => Err(Rejection::UNAUTHORIZED),
    }
}

async fn reject(mut socket: WebSocket, note_id: NoteId, rejection: Rejection) {
    tracing::info!(
        note_id = %note_id,
        reason = rejection.reason,
        "Collaboration join rejected"
    );
    let _ = socket.send(close_message(rejection.code, rejection.reason)).await;
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

async fn run_connection(socket: WebSocket, state: AppState, note_id: NoteId, tier: PermissionTier) {
    let (conn, outbound) = state
        .registry()
        .join(PendingConnection::new(note_id, tier))
        .await;
    tracing::info!(
        note_id = %note_id,
        connection_id = %conn.id,
        permission = %tier,
        "Collaborator joined"
    );

    let (mut sink, stream) = socket.split();
    let joined = ServerFrame::Joined(JoinedFrame {
        note_id,
        connection_id: conn.id.to_string(),
        permission: tier,
    });

    if send_frame(&mut sink, &joined).await.is_ok() {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (seen_tx, seen_rx) = watch::channel(Instant::now());

        let mut writer = tokio::spawn(write_loop(
            sink,
            outbound,
            control_rx,
            state.shutdown_signal(),
            Heartbeat {
                interval: state.config().heartbeat_interval,
                last_seen: seen_rx,
            },
        ));
        let mut reader = tokio::spawn(read_loop(
            stream,
            state.clone(),
            conn.clone(),
            control_tx,
            seen_tx,
        ));

        tokio::select! {
            _ = &mut writer => reader.abort(),
            _ = &mut reader => writer.abort(),
        }
    }

    leave(&state, &conn).await;
}

/// Remove the connection from its room, flushing the note if the room emptied.
async fn leave(state: &AppState, conn: &JoinedConnection) {
    let note_id = conn.note_id();
    let timeout = state.config().leave_timeout;

    match tokio::time::timeout(timeout, state.registry().leave(&conn.id)).await {
        Ok(_) => {
            if !state.registry().has_room(note_id).await {
                state.hub().flush(note_id);
            }
            tracing::info!(note_id = %note_id, connection_id = %conn.id, "Collaborator left");
        }
        Err(_) => {
            tracing::warn!(
                note_id = %note_id,
                connection_id = %conn.id,
                ?timeout,
                "Timed out removing connection from room"
            );
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: AppState,
    conn: JoinedConnection,
    control: mpsc::UnboundedSender<ServerFrame>,
    seen: watch::Sender<Instant>,
) {
    while let Some(message) = stream.next().await {
        if message.is_ok() {
            seen.send_replace(Instant::now());
        }
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(connection_id = %conn.id, error = %e, "WebSocket read failed");
                break;
            }
        };

        let frame = match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = control.send(ServerFrame::Error(ErrorFrame::new(
                    "bad_frame",
                    format!("unrecognized frame: {}", e),
                )));
                continue;
            }
        };

        let result = match frame {
            ClientFrame::Edit(edit) => state.hub().publish(&conn, edit.payload).await.map(|_| ()),
            ClientFrame::Flush => require_tier(conn.tier, PermissionTier::Write)
                .map(|()| state.hub().flush(conn.note_id())),
        };

        match result {
            Ok(()) => {}
            Err(CollabError::TransportClosed) => {
                let _ = control.send(ServerFrame::Error(ErrorFrame::new(
                    "closed",
                    "connection is no longer in the room",
                )));
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %conn.id, error = %e, "Frame rejected");
                let _ = control.send(ServerFrame::Error(ErrorFrame::new(
                    e.frame_code(),
                    e.to_string(),
                )));
            }
        }
    }
}

/// Ping schedule plus the time the reader last heard from the peer.
struct Heartbeat {
    interval: std::time::Duration,
    last_seen: watch::Receiver<Instant>,
}

impl Heartbeat {
    /// The peer missed two consecutive heartbeats.
    fn expired(&self) -> bool {
        self.last_seen.borrow().elapsed() >= self.interval * 2
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<crate::collab::Delivery>,
    mut control: mpsc::UnboundedReceiver<ServerFrame>,
    mut shutdown: watch::Receiver<bool>,
    heartbeat: Heartbeat,
) {
    let mut ping = tokio::time::interval(heartbeat.interval);
    ping.tick().await;
    let mut shutdown_open = true;

    loop {
        tokio::select! {
            delivery = outbound.recv() => match delivery {
                Some(delivery) => {
                    if send_frame(&mut sink, &ServerFrame::Edit(delivery.to_frame())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(close_message(CLOSE_SLOW_CONSUMER, "slow_consumer")).await;
                    break;
                }
            },
            Some(frame) = control.recv() => {
                if send_frame(&mut sink, &frame).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if heartbeat.expired() {
                    tracing::info!("Peer stopped answering pings");
                    let _ = sink.send(close_message(CLOSE_IDLE_TIMEOUT, "idle_timeout")).await;
                    break;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            changed = shutdown.changed(), if shutdown_open => {
                if changed.is_err() {
                    shutdown_open = false;
                } else if *shutdown.borrow() {
                    let _ = sink.send(close_message(CLOSE_GOING_AWAY, "going_away")).await;
                    break;
                }
            }
        }
    }
}

/// Build collaboration routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/collaborate/{id}", get(collaborate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{NOTE, OWNER, test_state};
    use notecollab_core::{ShareGrant, ShareToken, UserId};
    use notecollab_store::GrantStore;

    fn evidence(session: Option<UserId>, token: Option<ShareToken>) -> Result<SocketEvidence, ApiError> {
        Ok(SocketEvidence(crate::collab::Evidence { session, token }))
    }

    #[tokio::test]
    async fn test_admit_outcomes() {
        let (state, store) = test_state().await;
        let grant = ShareGrant::new(NOTE, PermissionTier::Write);
        store.insert_grant(&grant).await.unwrap();

        assert_eq!(
            admit(&state, NOTE, evidence(None, Some(grant.token.clone()))).await,
            Ok(PermissionTier::Write)
        );
        assert_eq!(
            admit(&state, NOTE, evidence(Some(OWNER), None)).await,
            Ok(PermissionTier::Full)
        );
        assert_eq!(
            admit(&state, NOTE, evidence(None, None)).await,
            Err(Rejection::UNAUTHORIZED)
        );
        assert_eq!(
            admit(&state, NOTE, Err(ApiError::Unauthorized("bad".into()))).await,
            Err(Rejection::UNAUTHORIZED)
        );
    }

    #[tokio::test]
    async fn test_missing_note_only_revealed_to_sessions() {
        let (state, _store) = test_state().await;
        let missing = NoteId(404);

        assert_eq!(
            admit(&state, missing, evidence(None, Some(ShareToken::generate()))).await,
            Err(Rejection::UNAUTHORIZED)
        );
        assert_eq!(
            admit(&state, missing, evidence(Some(UserId(2)), None)).await,
            Err(Rejection::NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_heartbeat_expires_after_two_intervals() {
        let (seen_tx, seen_rx) = watch::channel(Instant::now());
        let heartbeat = Heartbeat {
            interval: std::time::Duration::from_millis(20),
            last_seen: seen_rx,
        };
        assert!(!heartbeat.expired());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(heartbeat.expired());

        seen_tx.send_replace(Instant::now());
        assert!(!heartbeat.expired());
    }
}
