//! Owner session tokens.
//!
//! Sessions are minted by the login service and validated here. They are
//! HS256 JWTs whose `sub` claim is the numeric user id.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use notecollab_core::UserId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Session JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// User ID (subject).
    pub sub: i64,
    /// Expiration time (unix timestamp).
    pub exp: usize,
    /// Issued at (unix timestamp).
    pub iat: usize,
}

/// Create a session token for a user.
pub fn create_session(user: UserId, secret: &str, expiry_hours: u64) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let exp = (now + chrono::Duration::hours(expiry_hours as i64)).timestamp() as usize;

    let claims = SessionClaims {
        sub: user.get(),
        exp,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to create session: {}", e)))
}

/// Validate a session token and return the user it belongs to.
pub fn validate_session(token: &str, secret: &str) -> Result<UserId, ApiError> {
    if secret.is_empty() {
        return Err(ApiError::Unauthorized(
            "session tokens are not accepted by this server".into(),
        ));
    }

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Session validation failed");
        ApiError::Unauthorized(format!("Invalid session: {}", e))
    })?;

    Ok(UserId(token_data.claims.sub))
}
