//! # Session Store
//!
//! Owns session identity, creation, lookup-with-expiry and deletion. Every
//! read re-checks the TTL and evicts stale entries; a periodic sweep does the
//! same in the background, skipping sessions locked by in-flight operations.

use crate::error::{CheckoutError, CheckoutResult};
use crate::session::CheckoutSession;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a stored session; the mutex is the per-session mutual exclusion
/// required for every mutation.
pub type SessionHandle = Arc<Mutex<CheckoutSession>>;

struct StoreEntry {
    handle: SessionHandle,
    /// Copied out of the session at creation; immutable, so it can be
    /// checked without taking the session lock.
    expires_at: DateTime<Utc>,
}

/// In-memory store of live checkout sessions, keyed by opaque id
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, StoreEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a fresh pending session and return a snapshot of it
    pub async fn create(&self) -> CheckoutSession {
        let session = CheckoutSession::new(self.ttl);
        let snapshot = session.clone();
        let entry = StoreEntry {
            expires_at: session.expires_at,
            handle: Arc::new(Mutex::new(session)),
        };
        self.sessions
            .write()
            .await
            .insert(snapshot.id.clone(), entry);
        info!("Created checkout session: {}", snapshot.id);
        snapshot
    }

    /// Look up a live session.
    ///
    /// A session past its `expires_at` is evicted on the spot and reported as
    /// not found, never returned stale.
    pub async fn get(&self, session_id: &str) -> CheckoutResult<SessionHandle> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(entry) if now <= entry.expires_at => return Ok(entry.handle.clone()),
                Some(_) => {}
                None => {
                    return Err(CheckoutError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })
                }
            }
        }

        // Expired: evict under the write lock. Racing evictions are no-ops.
        self.sessions.write().await.remove(session_id);
        debug!("Evicted expired session on read: {}", session_id);
        Err(CheckoutError::SessionNotFound {
            session_id: session_id.to_string(),
        })
    }

    /// Remove a session unconditionally; removing twice is a no-op
    pub async fn delete(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Number of stored sessions, expired or not (sweep debt included)
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict every expired session whose lock can be claimed right now.
    ///
    /// Sessions held by an in-flight operation are skipped and collected on a
    /// later pass.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            if now <= entry.expires_at {
                return true;
            }
            // try_lock: never race an operation that holds the session.
            entry.handle.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Sweep evicted {} expired session(s)", evicted);
        }
        evicted
    }

    /// Start the periodic expiry sweep.
    ///
    /// The returned handle cancels the task when stopped or dropped, tying
    /// the sweep to the store's own lifecycle.
    pub fn start_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> SweeperHandle {
        let store = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                store.sweep().await;
            }
        });
        SweeperHandle { task }
    }
}

/// Cancellable handle to the background expiry sweep
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired_store() -> SessionStore {
        // Negative TTL: everything created is already expired.
        SessionStore::new(Duration::seconds(-1))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new(Duration::minutes(60));
        let created = store.create().await;

        let handle = store.get(&created.id).await.unwrap();
        assert_eq!(handle.lock().await.id, created.id);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = SessionStore::new(Duration::minutes(60));
        let err = store.get("cs_missing").await.unwrap_err();
        assert!(matches!(err, CheckoutError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_expired_session_unreachable_on_next_call() {
        let store = expired_store();
        let created = store.create().await;

        let err = store.get(&created.id).await.unwrap_err();
        assert!(matches!(err, CheckoutError::SessionNotFound { .. }));
        // Evicted, not merely hidden.
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SessionStore::new(Duration::minutes(60));
        let created = store.create().await;

        store.delete(&created.id).await;
        store.delete(&created.id).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired_only() {
        let store = SessionStore::new(Duration::minutes(60));
        store.create().await;

        // Plant an already-expired entry next to the live one.
        let stale = CheckoutSession::new(Duration::seconds(-1));
        let stale_id = stale.id.clone();
        store.sessions.write().await.insert(
            stale_id.clone(),
            StoreEntry {
                expires_at: stale.expires_at,
                handle: Arc::new(Mutex::new(stale)),
            },
        );

        assert_eq!(store.len().await, 2);
        let evicted = store.sweep().await;
        assert_eq!(evicted, 1);
        assert_eq!(store.len().await, 1);

        // Sweeping again is a no-op.
        assert_eq!(store.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_sessions() {
        let store = expired_store();
        let created = store.create().await;

        let handle = {
            let sessions = store.sessions.read().await;
            sessions.get(&created.id).unwrap().handle.clone()
        };
        let guard = handle.lock().await;

        assert_eq!(store.sweep().await, 0);
        assert_eq!(store.len().await, 1);

        drop(guard);
        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_task_evicts() {
        let store = Arc::new(expired_store());
        store.create().await;
        let sweeper = store.start_sweeper(std::time::Duration::from_millis(10));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.len().await, 0);
        sweeper.stop();
    }
}
