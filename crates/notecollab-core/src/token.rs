//! Share token generation.
//!
//! A share token is the whole security boundary of an anonymous share link,
//! so it is drawn from the operating system's CSPRNG:
//!
//! 1. Fill 32 bytes (256 bits) from `OsRng`
//! 2. Encode them as unpadded base64url (43 characters)
//!
//! Tokens are opaque to the rest of the system. They are not signed and carry
//! no structure; possession is the capability.
//!
//! # Example
//!
//! ```
//! use notecollab_core::token::ShareToken;
//!
//! let token = ShareToken::generate();
//! assert_eq!(token.as_str().len(), 43);
//! assert_ne!(token, ShareToken::generate());
//! ```

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Number of random bytes in a share token.
pub const TOKEN_BYTES: usize = 32;

/// An opaque share token.
///
/// `Debug` only prints a short prefix so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Generate a new token from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token value presented by a client.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short, log-safe prefix of the token.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareToken({})", self.redacted())
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
