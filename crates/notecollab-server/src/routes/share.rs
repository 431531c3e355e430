//! Share routes.
//!
//! This module implements the owner-facing sharing endpoints:
//! - POST /notes/{id}/share-token - Mint a share link
//! - DELETE /share-tokens/{token} - Revoke a share link
//! - GET /notes/{id}/collaborators - List every grant on a note
//! - POST /notes/{id}/collaborators - Invite a named collaborator

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notecollab_core::{NoteId, PermissionTier, ShareGrant, ShareToken, UserId};

use crate::collab::CollabError;
use crate::error::ApiResult;
use crate::extract::{JsonBody, OwnerSession};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for minting a share link.
#[derive(Debug, Deserialize)]
pub struct ShareTokenRequest {
    /// `"read"`, `"write"` or `"full"`.
    pub permission: String,
}

/// A freshly issued token.
#[derive(Debug, Serialize)]
pub struct ShareTokenResponse {
    pub token: String,
    pub permission: PermissionTier,
}

/// Response for a successful revocation.
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Request body for inviting a collaborator.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// The invited user.
    pub identity: UserId,
    /// `"read"`, `"write"` or `"full"`.
    pub permission: String,
}

/// One grant on a note.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    /// Bound user, or `null` for an anonymous share link.
    pub identity: Option<UserId>,
    pub permission: PermissionTier,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl From<ShareGrant> for Collaborator {
    fn from(grant: ShareGrant) -> Self {
        Self {
            identity: grant.recipient,
            permission: grant.tier,
            token: grant.token.to_string(),
            created_at: grant.created_at,
        }
    }
}

fn parse_tier(raw: &str) -> Result<PermissionTier, CollabError> {
    raw.parse()
        .map_err(|_| CollabError::InvalidTier(raw.to_string()))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /notes/{id}/share-token - Mint a share link.
///
/// # Request
///
/// Body: `{ "permission": "read" | "write" | "full" }`
/// Header: `Authorization: Bearer <session>` of the note owner
///
/// # Response
///
/// - 200 OK: `{ "token": "...", "permission": "write" }`
/// - 400 Bad Request: Unknown permission or malformed body
/// - 401 Unauthorized: No valid session
/// - 403 Forbidden: Requester is not the owner
/// - 404 Not Found: Note not found
async fn issue_token(
    State(state): State<AppState>,
    OwnerSession(requester): OwnerSession,
    Path(note_id): Path<NoteId>,
    JsonBody(request): JsonBody<ShareTokenRequest>,
) -> ApiResult<Json<ShareTokenResponse>> {
    let tier = parse_tier(&request.permission)?;
    let grant = state.issuer().issue(note_id, requester, tier, None).await?;

    Ok(Json(ShareTokenResponse {
        token: grant.token.to_string(),
        permission: grant.tier,
    }))
}

/// DELETE /share-tokens/{token} - Revoke a share link.
///
/// Connections already admitted with the token stay open; new joins fail.
///
/// # Response
///
/// - 200 OK: `{ "revoked": true }`
/// - 401 Unauthorized: No valid session
/// - 404 Not Found: Token unknown, or the requester does not own its note
async fn revoke_token(
    State(state): State<AppState>,
    OwnerSession(requester): OwnerSession,
    Path(token): Path<String>,
) -> ApiResult<Json<RevokeResponse>> {
    let token = ShareToken::from_string(token);
    state.issuer().revoke(&token, requester).await?;
    Ok(Json(RevokeResponse { revoked: true }))
}

/// GET /notes/{id}/collaborators - List grants on a note, oldest first.
///
/// # Response
///
/// - 200 OK: `[{ "identity": 12 | null, "permission": "read", "token": "...", "createdAt": "..." }]`
/// - 401 Unauthorized: No valid session
/// - 403 Forbidden: Requester is not the owner
/// - 404 Not Found: Note not found
async fn list_collaborators(
    State(state): State<AppState>,
    OwnerSession(requester): OwnerSession,
    Path(note_id): Path<NoteId>,
) -> ApiResult<Json<Vec<Collaborator>>> {
    let grants = state.issuer().list(note_id, requester).await?;

    tracing::debug!(
        note_id = %note_id,
        grant_count = grants.len(),
        "Listed collaborators"
    );

    Ok(Json(grants.into_iter().map(Collaborator::from).collect()))
}

/// POST /notes/{id}/collaborators - Invite a collaborator.
///
/// Creates a grant bound to `identity` and notifies them.
///
/// # Request
///
/// Body: `{ "identity": 12, "permission": "write" }`
///
/// # Response
///
/// - 200 OK: `{ "token": "...", "permission": "write" }`
/// - 400 Bad Request: Unknown permission or malformed body
/// - 401 Unauthorized: No valid session
/// - 403 Forbidden: Requester is not the owner
/// - 404 Not Found: Note not found
async fn invite_collaborator(
    State(state): State<AppState>,
    OwnerSession(requester): OwnerSession,
    Path(note_id): Path<NoteId>,
    JsonBody(request): JsonBody<InviteRequest>,
) -> ApiResult<Json<ShareTokenResponse>> {
    let tier = parse_tier(&request.permission)?;
    let grant = state
        .issuer()
        .invite(note_id, requester, request.identity, tier)
        .await?;

    Ok(Json(ShareTokenResponse {
        token: grant.token.to_string(),
        permission: grant.tier,
    }))
}

/// Build share routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notes/{id}/share-token", post(issue_token))
        .route("/share-tokens/{token}", delete(revoke_token))
        .route(
            "/notes/{id}/collaborators",
            get(list_collaborators).post(invite_collaborator),
        )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::routes::test_support::{NOTE, OWNER, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_issue_token_rejects_unknown_tier() {
        let (state, _store) = test_state().await;
        let result = issue_token(
            State(state),
            OwnerSession(OWNER),
            Path(NOTE),
            JsonBody(ShareTokenRequest {
                permission: "admin".into(),
            }),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_issue_then_list_then_revoke() {
        let (state, _store) = test_state().await;

        let Json(issued) = issue_token(
            State(state.clone()),
            OwnerSession(OWNER),
            Path(NOTE),
            JsonBody(ShareTokenRequest {
                permission: "write".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(issued.permission, PermissionTier::Write);
        assert_eq!(issued.token.len(), 43);

        let Json(listed) = list_collaborators(State(state.clone()), OwnerSession(OWNER), Path(NOTE))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identity, None);
        assert_eq!(listed[0].token, issued.token);

        let Json(revoked) = revoke_token(
            State(state.clone()),
            OwnerSession(OWNER),
            Path(issued.token.clone()),
        )
        .await
        .unwrap();
        assert!(revoked.revoked);

        let again = revoke_token(State(state), OwnerSession(OWNER), Path(issued.token)).await;
        assert!(matches!(again, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_non_owner_is_forbidden() {
        let (state, _store) = test_state().await;
        let result = invite_collaborator(
            State(state),
            OwnerSession(UserId(99)),
            Path(NOTE),
            JsonBody(InviteRequest {
                identity: UserId(2),
                permission: "read".into(),
            }),
        )
        .await;
        assert_eq!(result.unwrap_err().status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_collaborator_serialize() {
        let grant = ShareGrant::new(NOTE, PermissionTier::Read).bound_to(UserId(4));
        let json = serde_json::to_value(Collaborator::from(grant)).unwrap();
        assert_eq!(json["identity"], 4);
        assert_eq!(json["permission"], "read");
        assert!(json.get("createdAt").is_some());
    }
}
