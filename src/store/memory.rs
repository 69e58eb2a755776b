//! In-process stores for tests and single-node local runs.
//!
//! Each store keeps all of its views behind one lock, which gives the same
//! all-or-nothing behaviour as the Postgres unique index and the Redis
//! MULTI/EXEC blocks.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::sessions::{Session, SessionStore, SESSION_NOT_FOUND};
use crate::store::users::{NewUser, User, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(AppError::Conflict(
                "User with the same email already exists".to_string(),
            ));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            patronymic: user.patronymic,
            last_name: user.last_name,
            created_at: Utc::now(),
        };
        users.insert(created.email.clone(), created.clone());

        Ok(created)
    }
}

#[derive(Default)]
struct SessionTables {
    by_id: HashMap<Uuid, Session>,
    by_owner: HashMap<String, VecDeque<Session>>,
}

impl SessionTables {
    fn insert(&mut self, session: &Session) {
        self.by_id.insert(session.jti, session.clone());
        self.by_owner
            .entry(session.email.clone())
            .or_default()
            .push_front(session.clone());
    }

    fn delete(&mut self, session: &Session) {
        self.by_id.remove(&session.jti);
        if let Some(list) = self.by_owner.get_mut(&session.email) {
            list.retain(|entry| entry != session);
            if list.is_empty() {
                self.by_owner.remove(&session.email);
            }
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    tables: RwLock<SessionTables>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), AppError> {
        self.tables.write().await.insert(session);
        Ok(())
    }

    async fn list_by_owner(&self, email: &str) -> Result<Vec<Session>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_owner
            .get(email)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, jti: Uuid) -> Result<Session, AppError> {
        self.tables
            .read()
            .await
            .by_id
            .get(&jti)
            .cloned()
            .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))
    }

    async fn remove(&self, session: &Session) -> Result<(), AppError> {
        self.tables.write().await.delete(session);
        Ok(())
    }

    async fn replace(&self, old: &Session, new: &Session) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.by_id.get(&old.jti) != Some(old) {
            return Err(AppError::NotFound(SESSION_NOT_FOUND.to_string()));
        }
        tables.delete(old);
        tables.insert(new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_for(email: &str) -> Session {
        Session {
            jti: Uuid::new_v4(),
            device_id: Uuid::new_v4(),
            email: email.to_string(),
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: format!("refresh-{}", Uuid::new_v4()),
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ivan".to_string(),
            patronymic: None,
            last_name: "Petrov".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_find_user() {
        let store = InMemoryUserStore::new();
        let created = store.create(new_user("a@example.com")).await.unwrap();

        let found = store.find_by_email("a@example.com").await.unwrap();
        assert_eq!(found, Some(created));
        assert!(store.find_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@example.com")).await.unwrap();

        let result = store.create(new_user("a@example.com")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_listed_newest_first() {
        let store = InMemorySessionStore::new();
        let first = session_for("a@example.com");
        let second = session_for("a@example.com");
        let foreign = session_for("b@example.com");

        store.save(&first).await.unwrap();
        store.save(&foreign).await.unwrap();
        store.save(&second).await.unwrap();

        let listed = store.list_by_owner("a@example.com").await.unwrap();
        assert_eq!(listed, vec![second, first]);
        assert!(store.list_by_owner("c@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_clears_both_views() {
        let store = InMemorySessionStore::new();
        let kept = session_for("a@example.com");
        let dropped = session_for("a@example.com");
        store.save(&kept).await.unwrap();
        store.save(&dropped).await.unwrap();

        store.remove(&dropped).await.unwrap();

        assert!(matches!(
            store.get_by_id(dropped.jti).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.list_by_owner("a@example.com").await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn replace_swaps_record_and_moves_it_to_front() {
        let store = InMemorySessionStore::new();
        let rotated = session_for("a@example.com");
        let other = session_for("a@example.com");
        store.save(&rotated).await.unwrap();
        store.save(&other).await.unwrap();

        let mut fresh = rotated.clone();
        fresh.access_token = "new-access".to_string();
        fresh.refresh_token = "new-refresh".to_string();
        store.replace(&rotated, &fresh).await.unwrap();

        assert_eq!(store.get_by_id(rotated.jti).await.unwrap(), fresh);
        assert_eq!(
            store.list_by_owner("a@example.com").await.unwrap(),
            vec![fresh, other]
        );
    }

    #[tokio::test]
    async fn replace_of_a_stale_record_changes_nothing() {
        let store = InMemorySessionStore::new();
        let current = session_for("a@example.com");
        store.save(&current).await.unwrap();

        let mut stale = current.clone();
        stale.refresh_token = "rotated-out".to_string();
        let mut fresh = current.clone();
        fresh.refresh_token = "new-refresh".to_string();

        let result = store.replace(&stale, &fresh).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.get_by_id(current.jti).await.unwrap(), current);
        assert_eq!(
            store.list_by_owner("a@example.com").await.unwrap(),
            vec![current]
        );
    }

    #[tokio::test]
    async fn replace_of_a_removed_session_is_not_found() {
        let store = InMemorySessionStore::new();
        let removed = session_for("a@example.com");
        store.save(&removed).await.unwrap();
        store.remove(&removed).await.unwrap();

        let mut fresh = removed.clone();
        fresh.refresh_token = "new-refresh".to_string();

        assert!(matches!(
            store.replace(&removed, &fresh).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.list_by_owner("a@example.com").await.unwrap().is_empty());
    }
}
