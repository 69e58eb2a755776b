//! Redis session store against a live server.
//!
//! Run with `cargo test -- --ignored`; `REDIS_URL` defaults to
//! `redis://127.0.0.1:6379`.

use auth_service::configuration::RedisSettings;
use auth_service::error::AppError;
use auth_service::store::{RedisSessionStore, Session, SessionStore};
use uuid::Uuid;

fn store() -> RedisSessionStore {
    let settings = RedisSettings {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        pool_size: 4,
        timeout_ms: 2000,
    };
    RedisSessionStore::from_settings(&settings).expect("Failed to build redis pool")
}

/// Fresh owner per test so runs never see each other's lists
fn owner() -> String {
    format!("{}@example.com", Uuid::new_v4())
}

fn session_for(email: &str) -> Session {
    Session {
        jti: Uuid::new_v4(),
        device_id: Uuid::new_v4(),
        email: email.to_string(),
        access_token: format!("access-{}", Uuid::new_v4()),
        refresh_token: format!("refresh-{}", Uuid::new_v4()),
    }
}

fn rotated(session: &Session) -> Session {
    Session {
        access_token: format!("access-{}", Uuid::new_v4()),
        refresh_token: format!("refresh-{}", Uuid::new_v4()),
        ..session.clone()
    }
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn save_writes_both_views_newest_first() {
    let store = store();
    let email = owner();
    let first = session_for(&email);
    let second = session_for(&email);

    store.save(&first).await.unwrap();
    store.save(&second).await.unwrap();

    assert_eq!(store.get_by_id(first.jti).await.unwrap(), first);
    assert_eq!(
        store.list_by_owner(&email).await.unwrap(),
        vec![second.clone(), first.clone()]
    );

    store.remove(&first).await.unwrap();
    store.remove(&second).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn remove_clears_the_record_and_its_list_entry() {
    let store = store();
    let email = owner();
    let kept = session_for(&email);
    let dropped = session_for(&email);
    store.save(&kept).await.unwrap();
    store.save(&dropped).await.unwrap();

    store.remove(&dropped).await.unwrap();

    assert!(matches!(
        store.get_by_id(dropped.jti).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(store.list_by_owner(&email).await.unwrap(), vec![kept.clone()]);

    store.remove(&kept).await.unwrap();
    assert!(store.list_by_owner(&email).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn replace_swaps_the_record_in_both_views() {
    let store = store();
    let email = owner();
    let current = session_for(&email);
    store.save(&current).await.unwrap();

    let fresh = rotated(&current);
    store.replace(&current, &fresh).await.unwrap();

    assert_eq!(store.get_by_id(current.jti).await.unwrap(), fresh);
    assert_eq!(store.list_by_owner(&email).await.unwrap(), vec![fresh.clone()]);

    store.remove(&fresh).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn replace_with_a_stale_record_leaves_one_list_entry() {
    let store = store();
    let email = owner();
    let current = session_for(&email);
    store.save(&current).await.unwrap();

    let winner = rotated(&current);
    let loser = rotated(&current);
    store.replace(&current, &winner).await.unwrap();

    let result = store.replace(&current, &loser).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(store.get_by_id(current.jti).await.unwrap(), winner);
    assert_eq!(store.list_by_owner(&email).await.unwrap(), vec![winner.clone()]);

    store.remove(&winner).await.unwrap();
    assert!(store.list_by_owner(&email).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn concurrent_replaces_of_one_record_never_both_apply() {
    let store = store();
    let email = owner();
    let current = session_for(&email);
    store.save(&current).await.unwrap();

    let first = rotated(&current);
    let second = rotated(&current);
    let (a, b) = tokio::join!(
        store.replace(&current, &first),
        store.replace(&current, &second),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let listed = store.list_by_owner(&email).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(store.get_by_id(current.jti).await.unwrap(), listed[0]);

    store.remove(&listed[0]).await.unwrap();
}
