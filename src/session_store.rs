//! # Session Store Module
//!
//! Holds the dialog context and food ledger of every chat the bot talks to.
//!
//! Each session sits behind its own async mutex. The router keeps that lock for
//! the whole handling of one event, so a redelivered update can never interleave
//! with a newer one for the same chat, while other chats proceed in parallel.
//! The map lock is only taken to find, create, or evict a slot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dialogue::{DialogueState, SessionContext};
use crate::ledger::FoodLedger;

/// Stable identifier of a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of one chat
#[derive(Debug, Clone)]
pub struct Session {
    pub context: SessionContext,
    pub ledger: FoodLedger,
    hydrated: bool,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            context: SessionContext::default(),
            ledger: FoodLedger::new(),
            hydrated: false,
            last_active: Instant::now(),
        }
    }

    /// Whether the stored ledger snapshot still has to be loaded
    pub fn needs_hydration(&self) -> bool {
        !self.hydrated
    }

    pub fn mark_hydrated(&mut self) {
        self.hydrated = true;
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

type SessionSlot = Arc<Mutex<Session>>;

/// Session-keyed store of dialog contexts and ledgers
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: SessionId) -> SessionSlot {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new()))),
        )
    }

    /// Acquire exclusive access to a session, creating it on first use
    pub async fn lock(&self, id: SessionId) -> OwnedMutexGuard<Session> {
        let slot = self.slot(id).await;
        let mut session = slot.lock_owned().await;
        session.touch();
        session
    }

    /// Current context of a session (the initial one if it never spoke)
    pub async fn get(&self, id: SessionId) -> SessionContext {
        self.lock(id).await.context.clone()
    }

    /// Replace the dialog state of a session
    pub async fn set(&self, id: SessionId, state: DialogueState) {
        self.lock(id).await.context.state = state;
    }

    /// Put a session back at the main menu
    pub async fn reset(&self, id: SessionId) {
        self.lock(id).await.context.reset();
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Drop sessions idle for at least `max_idle`.
    ///
    /// A session that is locked or about to be locked by a handler is kept:
    /// handlers clone the slot under the map lock, which we hold here.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) if session.idle_for() >= max_idle => {
                    debug!(session_id = %id, "Evicting idle session");
                    false
                }
                _ => true,
            }
        });
        before - sessions.len()
    }
}

/// Periodically evict idle sessions for the lifetime of the process
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    interval: Duration,
    max_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(max_idle).await;
            if evicted > 0 {
                info!(evicted, "Idle sessions evicted");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_are_created_lazily() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        let ctx = store.get(SessionId(7)).await;
        assert!(ctx.is_initial());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_and_reset() {
        let store = SessionStore::new();
        let id = SessionId(1);

        store.set(id, DialogueState::AwaitingLogDate).await;
        assert_eq!(store.get(id).await.state, DialogueState::AwaitingLogDate);

        store.reset(id).await;
        assert_eq!(store.get(id).await.state, DialogueState::MainMenu);
    }

    #[tokio::test]
    async fn test_locked_sessions_survive_eviction() {
        let store = SessionStore::new();
        let held = store.lock(SessionId(1)).await;
        store.lock(SessionId(2)).await;

        let evicted = store.evict_idle(Duration::ZERO).await;
        assert_eq!(evicted, 1);
        assert_eq!(store.len().await, 1);
        drop(held);
    }
}
