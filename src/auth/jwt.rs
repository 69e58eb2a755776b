/// JWT Token Generation and Validation
///
/// Access and refresh tokens are minted by the same signer and carry the
/// same claim shape; only the TTL differs.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

use crate::auth::claims::{Claims, TokenClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Mints and checks signed, expiring tokens
#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Sign `claims` into a token that expires `ttl` from now
    async fn sign(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, AppError>;

    /// Check signature, issuer and expiry and return the payload
    ///
    /// # Errors
    /// `AuthError::TokenExpired` past `exp`, `AuthError::TokenInvalid` otherwise
    fn verify(&self, token: &str) -> Result<Claims, AppError>;
}

/// HS256 signer keyed by the process-wide secret
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtSigner {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Verify issuer matches configuration
        validation.set_issuer(&[&config.issuer]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
        }
    }
}

#[async_trait]
impl TokenSigner for JwtSigner {
    async fn sign(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims::new(claims.clone(), ttl.as_secs() as i64, self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
                    _ => AppError::Auth(AuthError::TokenInvalid),
                }
            })
    }
}
