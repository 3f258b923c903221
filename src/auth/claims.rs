/// JWT Claims structure
///
/// Payload shared by access and refresh tokens (RFC 7519 registered claims
/// only). The two token kinds differ by signing secret and lifetime, not by
/// shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which secret and lifetime a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp), always after `iat`
    pub exp: i64,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Create claims valid from now for `lifetime_seconds`
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `issuer` - Issuer identifier
    /// * `audience` - Intended audience
    /// * `lifetime_seconds` - Must be positive
    pub fn new(user_id: Uuid, issuer: &str, audience: &str, lifetime_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: now,
            exp: now + lifetime_seconds,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Parse the subject back into a user id
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}
