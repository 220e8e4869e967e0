use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use telefit::dialogue::DialogueState;
use telefit::ledger::FoodEntry;
use telefit::session_store::{spawn_sweeper, SessionId, SessionStore};

#[tokio::test]
async fn test_lock_serializes_events_of_one_session() -> Result<()> {
    let store = Arc::new(SessionStore::new());
    let id = SessionId(1);

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut session = store.lock(id).await;
            let len = session.ledger.len();
            tokio::task::yield_now().await;
            // A lost update would show up as a shorter ledger.
            session
                .ledger
                .append(FoodEntry::new(format!("item{i}"), 1.0, 1.0).unwrap())
                .unwrap();
            assert_eq!(session.ledger.len(), len + 1);
        }));
    }
    for handle in handles {
        handle.await?;
    }

    assert_eq!(store.lock(id).await.ledger.len(), 10);
    Ok(())
}

#[tokio::test]
async fn test_idle_sessions_are_evicted() -> Result<()> {
    let store = SessionStore::new();
    store.set(SessionId(1), DialogueState::AwaitingLogDate).await;
    store.set(SessionId(2), DialogueState::AwaitingPhoto).await;

    assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
    assert_eq!(store.evict_idle(Duration::ZERO).await, 2);
    assert!(store.is_empty().await);

    // An evicted session starts over
    assert!(store.get(SessionId(1)).await.is_initial());
    Ok(())
}

#[tokio::test]
async fn test_in_use_sessions_are_not_evicted() -> Result<()> {
    let store = SessionStore::new();
    let guard = store.lock(SessionId(1)).await;

    assert_eq!(store.evict_idle(Duration::ZERO).await, 0);
    assert_eq!(store.len().await, 1);
    drop(guard);

    assert_eq!(store.evict_idle(Duration::ZERO).await, 1);
    Ok(())
}

#[tokio::test]
async fn test_sweeper_runs_periodically() -> Result<()> {
    let store = Arc::new(SessionStore::new());
    store.set(SessionId(5), DialogueState::AwaitingPhoto).await;

    let sweeper = spawn_sweeper(Arc::clone(&store), Duration::from_millis(20), Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(store.is_empty().await);
    sweeper.abort();
    Ok(())
}
