//! Session persistence.
//!
//! Every session is reachable two ways: by `jti` (`session:{jti}`) and through
//! its owner's list (`user_session:{email}`, newest first). Both views are
//! written in one MULTI/EXEC so a session is never visible through only one.

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, PoolConfig, Runtime};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::configuration::RedisSettings;
use crate::error::{AppError, ConfigError};

/// Shared by "no such session" and "not your session".
pub const SESSION_NOT_FOUND: &str = "Session not found";

/// One authenticated login on one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub jti: Uuid,
    pub device_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Listing projection of a [`Session`], tokens left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub jti: Uuid,
    pub device_id: Uuid,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            jti: session.jti,
            device_id: session.device_id,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store under `jti` and push onto the owner's list, atomically.
    async fn save(&self, session: &Session) -> Result<(), AppError>;

    /// All sessions of `email`, most recently saved first.
    async fn list_by_owner(&self, email: &str) -> Result<Vec<Session>, AppError>;

    /// # Errors
    /// `AppError::NotFound` if no session has this `jti`
    async fn get_by_id(&self, jti: Uuid) -> Result<Session, AppError>;

    /// Drop the `jti` record and the owner-list entry, atomically.
    async fn remove(&self, session: &Session) -> Result<(), AppError>;

    /// `remove(old)` followed by `save(new)` as one atomic step, applied only
    /// while the stored record still equals `old`.
    ///
    /// # Errors
    /// `AppError::NotFound` if the record was removed or changed since `old`
    /// was read; nothing is written in that case
    async fn replace(&self, old: &Session, new: &Session) -> Result<(), AppError>;
}

fn session_key(jti: Uuid) -> String {
    format!("session:{}", jti)
}

fn owner_key(email: &str) -> String {
    format!("user_session:{}", email)
}

pub struct RedisSessionStore {
    pool: Pool,
}

impl RedisSessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_settings(settings: &RedisSettings) -> Result<Self, AppError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut pool_config = PoolConfig::new(settings.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&settings.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConfigError::InvalidValue(format!("redis pool: {}", e)))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &Session) -> Result<(), AppError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.pool.get().await?;

        let _: () = redis::pipe()
            .atomic()
            .set(session_key(session.jti), &payload)
            .ignore()
            .lpush(owner_key(&session.email), &payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(jti = %session.jti, "Session stored");
        Ok(())
    }

    async fn list_by_owner(&self, email: &str) -> Result<Vec<Session>, AppError> {
        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn.lrange(owner_key(email), 0, -1).await?;

        raw.iter()
            .map(|entry| serde_json::from_str::<Session>(entry).map_err(AppError::from))
            .collect()
    }

    async fn get_by_id(&self, jti: Uuid) -> Result<Session, AppError> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(session_key(jti)).await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(AppError::NotFound(SESSION_NOT_FOUND.to_string())),
        }
    }

    async fn remove(&self, session: &Session) -> Result<(), AppError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.pool.get().await?;

        let _: () = redis::pipe()
            .atomic()
            .del(session_key(session.jti))
            .ignore()
            .lrem(owner_key(&session.email), 0, &payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(jti = %session.jti, "Session removed");
        Ok(())
    }

    async fn replace(&self, old: &Session, new: &Session) -> Result<(), AppError> {
        let old_payload = serde_json::to_string(old)?;
        let new_payload = serde_json::to_string(new)?;
        let key = session_key(old.jti);
        let mut conn = self.pool.get().await?;

        // EXEC aborts if the record changes after WATCH
        let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut conn).await?;

        let stored: Option<String> = conn.get(&key).await?;
        let unchanged = match stored {
            Some(raw) => serde_json::from_str::<Session>(&raw).map_or(false, |s| s == *old),
            None => false,
        };
        if !unchanged {
            let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
            return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
        }

        let applied: Option<()> = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .lrem(owner_key(&old.email), 0, &old_payload)
            .ignore()
            .set(session_key(new.jti), &new_payload)
            .ignore()
            .lpush(owner_key(&new.email), &new_payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if applied.is_none() {
            tracing::warn!(jti = %old.jti, "Session changed during replace");
            return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
        }

        tracing::debug!(old_jti = %old.jti, new_jti = %new.jti, "Session replaced");
        Ok(())
    }
}
