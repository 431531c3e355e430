//! Note read path for collaborators, and the owner's view of live connections.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use notecollab_core::{NoteId, PermissionTier};

use crate::collab::{CollabError, Evidence, MemberSnapshot, ResolutionSource};
use crate::error::{ApiError, ApiResult};
use crate::extract::OwnerSession;
use crate::state::AppState;

/// Note fields exposed to collaborators.
#[derive(Debug, Serialize)]
pub struct NoteView {
    pub id: NoteId,
    pub title: String,
    pub content: String,
}

/// Response for reading a shared note.
#[derive(Debug, Serialize)]
pub struct ReadNoteResponse {
    pub note: NoteView,
    pub permission: PermissionTier,
}

/// GET /notes/{id} - Read a note with a session and/or share token.
///
/// Every failure, including a missing note or a malformed session, is
/// answered with the same 403 so note ids cannot be probed.
///
/// # Response
///
/// - 200 OK: `{ "note": { "id", "title", "content" }, "permission": "read" }`
/// - 403 Forbidden: No access
async fn read_note(
    State(state): State<AppState>,
    evidence: Result<Evidence, ApiError>,
    Path(note_id): Path<NoteId>,
) -> ApiResult<Json<ReadNoteResponse>> {
    let denied = || ApiError::Forbidden("access denied".to_string());

    let evidence = evidence.map_err(|_| denied())?;
    let resolution = match state.resolver().resolve(note_id, &evidence).await {
        Ok(resolution) => resolution,
        Err(CollabError::Storage(e)) => return Err(e.into()),
        Err(e) => {
            tracing::debug!(note_id = %note_id, reason = %e, "Read denied");
            return Err(denied());
        }
    };

    let note = resolution.note;
    Ok(Json(ReadNoteResponse {
        note: NoteView {
            id: note.id,
            title: note.title,
            content: note.content,
        },
        permission: resolution.tier,
    }))
}

/// GET /notes/{id}/connections - Snapshot of the note's room. Owner only.
///
/// # Response
///
/// - 200 OK: `[{ "connectionId": "...", "permission": "write", "joinedAt": "..." }]`
/// - 401 Unauthorized: No valid session
/// - 403 Forbidden: Requester is not the owner
/// - 404 Not Found: Note not found
async fn list_connections(
    State(state): State<AppState>,
    OwnerSession(requester): OwnerSession,
    Path(note_id): Path<NoteId>,
) -> ApiResult<Json<Vec<MemberSnapshot>>> {
    match state
        .resolver()
        .resolve(note_id, &Evidence::session(requester))
        .await
    {
        Ok(resolution) if resolution.source == ResolutionSource::Owner => {}
        Ok(_) | Err(CollabError::Unauthorized) => return Err(CollabError::NotOwner.into()),
        Err(e) => return Err(e.into()),
    }

    Ok(Json(state.registry().members_of(note_id).await))
}

/// Build note routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notes/{id}", get(read_note))
        .route("/notes/{id}/connections", get(list_connections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::PendingConnection;
    use crate::routes::test_support::{NOTE, OWNER, test_state};
    use axum::http::StatusCode;
    use notecollab_core::{ShareGrant, ShareToken, UserId};
    use notecollab_store::GrantStore;

    #[tokio::test]
    async fn test_read_with_token() {
        let (state, store) = test_state().await;
        let grant = ShareGrant::new(NOTE, PermissionTier::Read);
        store.insert_grant(&grant).await.unwrap();

        let Json(response) = read_note(
            State(state),
            Ok(Evidence::token(grant.token)),
            Path(NOTE),
        )
        .await
        .unwrap();
        assert_eq!(response.permission, PermissionTier::Read);
        assert_eq!(response.note.title, "Plans");
    }

    #[tokio::test]
    async fn test_read_failures_look_the_same() {
        let (state, _store) = test_state().await;

        let cases = [
            (NOTE, Ok(Evidence::token(ShareToken::generate()))),
            (NoteId(404), Ok(Evidence::token(ShareToken::generate()))),
            (NOTE, Ok(Evidence::default())),
            (NOTE, Err(ApiError::Unauthorized("bad session".into()))),
        ];
        for (note_id, evidence) in cases {
            let err = read_note(State(state.clone()), evidence, Path(note_id))
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
            assert_eq!(err.to_string(), "forbidden: access denied");
        }
    }

    #[tokio::test]
    async fn test_connections_owner_only() {
        let (state, _store) = test_state().await;
        let (conn, _rx) = state
            .registry()
            .join(PendingConnection::new(NOTE, PermissionTier::Write))
            .await;

        let Json(members) = list_connections(State(state.clone()), OwnerSession(OWNER), Path(NOTE))
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].connection_id, conn.id.to_string());

        let err = list_connections(State(state.clone()), OwnerSession(UserId(50)), Path(NOTE))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = list_connections(State(state), OwnerSession(OWNER), Path(NoteId(404)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
