/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. Both carry the owning
/// session's `jti` and `deviceId` so either token can be traced back to
/// its session record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-bound part of the payload, supplied by the caller when signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub email: String,
    pub jti: Uuid,
    #[serde(rename = "deviceId")]
    pub device_id: Uuid,
}

impl TokenClaims {
    pub fn new(email: impl Into<String>, jti: Uuid, device_id: Uuid) -> Self {
        Self {
            email: email.into(),
            jti,
            device_id,
        }
    }
}

/// Full JWT payload as it travels on the wire
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    #[serde(flatten)]
    pub session: TokenClaims,
    /// Per-token id, so two tokens signed in the same second still differ
    pub nonce: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// # Arguments
    /// * `session` - email, jti and deviceId of the owning session
    /// * `expiry_seconds` - Token lifetime in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(session: TokenClaims, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            session,
            nonce: Uuid::new_v4(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn email(&self) -> &str {
        &self.session.email
    }

    pub fn jti(&self) -> Uuid {
        self.session.jti
    }

    pub fn device_id(&self) -> Uuid {
        self.session.device_id
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
