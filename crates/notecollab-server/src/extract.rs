//! Evidence extraction from session headers, share-token headers and query
//! parameters, plus a JSON body extractor that answers in the API error
//! format.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{HeaderMap, request::Parts},
};
use notecollab_core::{ShareToken, UserId};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::auth::validate_session;
use crate::collab::Evidence;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying a share token.
pub const SHARE_TOKEN_HEADER: &str = "x-share-token";

/// Header carrying a raw user id (dev mode only).
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Query parameters that may carry evidence.
#[derive(Debug, Default, Deserialize)]
struct EvidenceQuery {
    token: Option<String>,
    session: Option<String>,
}

/// Evidence for a plain HTTP request.
///
/// Sources, in order:
/// 1. `Authorization: Bearer <session>`: validated HS256 session
/// 2. `X-User-Id: <id>`: only when `allow_dev_identity` is set
/// 3. `X-Share-Token` header, or the `token` query parameter
///
/// A present but malformed session is rejected rather than ignored.
impl FromRequestParts<AppState> for Evidence {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        evidence_from_parts(parts, state.config(), false)
    }
}

/// Evidence for a WebSocket upgrade. Browsers cannot set headers on a
/// WebSocket handshake, so the session may also arrive as `?session=`.
#[derive(Debug, Clone)]
pub struct SocketEvidence(pub Evidence);

impl FromRequestParts<AppState> for SocketEvidence {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        evidence_from_parts(parts, state.config(), true).map(SocketEvidence)
    }
}

/// An authenticated owner session. Rejects with 401 when absent.
#[derive(Debug, Clone, Copy)]
pub struct OwnerSession(pub UserId);

impl FromRequestParts<AppState> for OwnerSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers, state.config())?
            .map(OwnerSession)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization: Bearer <session>".into()))
    }
}

/// JSON request body. Malformed or mistyped bodies are a 400 with the usual
/// `{ "error": { ... } }` body instead of axum's plain-text 415/422.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}

fn evidence_from_parts(
    parts: &Parts,
    config: &ServerConfig,
    allow_query_session: bool,
) -> Result<Evidence, ApiError> {
    let query = Query::<EvidenceQuery>::try_from_uri(&parts.uri)
        .map(|q| q.0)
        .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e)))?;

    let mut session = session_from_headers(&parts.headers, config)?;
    if session.is_none() && allow_query_session {
        if let Some(raw) = query.session.as_deref() {
            session = Some(validate_session(raw, &config.session_secret)?);
        }
    }

    let token = header_str(&parts.headers, SHARE_TOKEN_HEADER)?
        .map(str::to_string)
        .or(query.token)
        .filter(|t| !t.is_empty())
        .map(ShareToken::from_string);

    Ok(Evidence { session, token })
}

/// Session from `Authorization: Bearer` or, in dev mode, `X-User-Id`.
fn session_from_headers(
    headers: &HeaderMap,
    config: &ServerConfig,
) -> Result<Option<UserId>, ApiError> {
    if let Some(auth) = header_str(headers, "authorization")? {
        let token = auth.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized("Authorization header must be Bearer <session>".into())
        })?;
        return validate_session(token.trim(), &config.session_secret).map(Some);
    }

    if config.allow_dev_identity {
        if let Some(raw) = header_str(headers, DEV_USER_HEADER)? {
            let user: UserId = raw
                .parse()
                .map_err(|_| ApiError::Unauthorized("X-User-Id must be a numeric id".into()))?;
            tracing::debug!(user_id = %user, "Using dev identity from X-User-Id header");
            return Ok(Some(user));
        }
    }

    Ok(None)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str().map_err(|_| {
                ApiError::Unauthorized(format!("{} header contains invalid characters", name))
            })
        })
        .transpose()
}
