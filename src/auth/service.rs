/// Session/Token Engine
///
/// Orchestrates registration, login, token rotation, session listing and
/// session revocation over the injected stores, hasher and signer. Holds no
/// mutable state of its own; every fact lives in the stores.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::claims::TokenClaims;
use crate::auth::jwt::TokenSigner;
use crate::auth::password::PasswordHasher;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{
    NewUser, Session, SessionInfo, SessionStore, UserStore, SESSION_NOT_FOUND,
};

const USER_NOT_FOUND: &str = "User not found";

/// Lifetimes of the two tokens of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtl {
    pub fn from_settings(config: &JwtSettings) -> Self {
        Self {
            access: Duration::from_secs(config.access_token_expiry.max(0) as u64),
            refresh: Duration::from_secs(config.refresh_token_expiry.max(0) as u64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: String,
    pub patronymic: Option<String>,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public profile of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    pub patronymic: Option<String>,
    #[serde(rename = "lastname")]
    pub last_name: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<dyn TokenSigner>,
    ttl: TokenTtl,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        ttl: TokenTtl,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            signer,
            ttl,
        }
    }

    pub fn signer(&self) -> Arc<dyn TokenSigner> {
        Arc::clone(&self.signer)
    }

    pub fn token_ttl(&self) -> TokenTtl {
        self.ttl
    }

    /// Create a user account
    ///
    /// # Errors
    /// - `Validation(PasswordMismatch)` before any store access
    /// - `Conflict` if the email is taken, whether seen by the pre-check or
    ///   by the store's uniqueness constraint
    pub async fn register_user(&self, payload: RegisterUser) -> Result<(), AppError> {
        if payload.password != payload.password_confirmation {
            return Err(ValidationError::PasswordMismatch.into());
        }

        if self.users.find_by_email(&payload.email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with the same email already exists".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(&payload.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: payload.email,
                password_hash,
                first_name: payload.first_name,
                patronymic: payload.patronymic,
                last_name: payload.last_name,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(())
    }

    /// Check credentials and open a new session
    ///
    /// Every login gets a fresh `jti` and a fresh `deviceId`.
    ///
    /// # Errors
    /// `Auth(InvalidCredentials)` for an unknown email and for a wrong
    /// password alike
    pub async fn login_user(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

        if !self.hasher.compare(password, &user.password_hash).await? {
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }

        let claims = TokenClaims::new(user.email, Uuid::new_v4(), Uuid::new_v4());
        let tokens = self.sign_pair(&claims).await?;

        let session = Session {
            jti: claims.jti,
            device_id: claims.device_id,
            email: claims.email,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        };
        self.sessions.save(&session).await?;

        tracing::info!(
            jti = %session.jti,
            device_id = %session.device_id,
            "Session opened"
        );
        Ok(tokens)
    }

    /// Exchange a refresh token for a new pair bound to the same session
    ///
    /// Only the refresh token currently stored on the session is accepted,
    /// so a rotated-out or revoked token fails. Of two concurrent rotations
    /// with the same token at most one succeeds.
    pub async fn update_tokens(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.signer.verify(refresh_token)?;

        let session = match self.sessions.get_by_id(claims.jti()).await {
            Ok(session) => session,
            Err(AppError::NotFound(_)) => {
                tracing::warn!(jti = %claims.jti(), "Refresh token for unknown session");
                return Err(AppError::Auth(AuthError::TokenInvalid));
            }
            Err(e) => return Err(e),
        };

        if session.email != claims.email()
            || session.device_id != claims.device_id()
            || session.refresh_token != refresh_token
        {
            tracing::warn!(jti = %session.jti, "Stale or foreign refresh token presented");
            return Err(AppError::Auth(AuthError::TokenInvalid));
        }

        let tokens = self.sign_pair(&claims.session).await?;
        if tokens.refresh_token == refresh_token {
            return Err(AppError::Internal(
                "Token rotation produced an unchanged refresh token".to_string(),
            ));
        }

        let renewed = Session {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            ..session.clone()
        };
        match self.sessions.replace(&session, &renewed).await {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                tracing::warn!(jti = %session.jti, "Session changed during token rotation");
                return Err(AppError::Auth(AuthError::TokenInvalid));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(jti = %renewed.jti, "Session tokens rotated");
        Ok(tokens)
    }

    pub async fn get_user_info(&self, email: &str) -> Result<UserInfo, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

        Ok(UserInfo {
            email: user.email,
            first_name: user.first_name,
            patronymic: user.patronymic,
            last_name: user.last_name,
        })
    }

    /// Sessions of `email`, newest first
    pub async fn get_user_sessions(&self, email: &str) -> Result<Vec<SessionInfo>, AppError> {
        let sessions = self.sessions.list_by_owner(email).await?;
        Ok(sessions.iter().map(SessionInfo::from).collect())
    }

    /// Revoke one of the caller's sessions
    ///
    /// # Errors
    /// `NotFound` both when `jti` does not exist and when it belongs to
    /// someone else; nothing is deleted in either case
    pub async fn remove_session(&self, requesting_email: &str, jti: Uuid) -> Result<(), AppError> {
        let session = self.sessions.get_by_id(jti).await?;

        if session.email != requesting_email {
            tracing::warn!(jti = %jti, "Attempt to remove a foreign session");
            return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
        }

        self.sessions.remove(&session).await?;

        tracing::info!(jti = %jti, "Session removed");
        Ok(())
    }

    async fn sign_pair(&self, claims: &TokenClaims) -> Result<TokenPair, AppError> {
        let (access_token, refresh_token) = futures::try_join!(
            self.signer.sign(claims, self.ttl.access),
            self.signer.sign(claims, self.ttl.refresh),
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
