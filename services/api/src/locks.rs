//! Per-session serialization.
//!
//! Message handling is read-modify-write against the store, so two
//! concurrent `send-message` calls for the same session would race. Each
//! session id maps to one async mutex; holding it serializes the whole
//! handle-message (and end-session) critical section for that session while
//! leaving other sessions fully concurrent.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// A lazily populated map of per-session mutexes.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a session, creating it on first use. The guard
    /// is owned so it can be held across awaits.
    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock entry for a session that reached a terminal state.
    /// Safe to call while a guard is live: existing guards keep their Arc.
    pub async fn release(&self, session_id: Uuid) {
        self.inner.lock().await.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_is_serialized() {
        let locks = Arc::new(SessionLocks::new());
        let session_id = Uuid::new_v4();
        let in_flight = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_flight = in_flight.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(session_id).await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst);
                assert_eq!(now, 0, "two tasks inside the critical section");
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn different_sessions_do_not_block_each_other() {
        let locks = SessionLocks::new();
        let a = locks.acquire(Uuid::new_v4()).await;
        // A second session's lock must be immediately available.
        let _b = locks.acquire(Uuid::new_v4()).await;
        drop(a);
    }

    #[tokio::test]
    async fn release_forgets_the_entry() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        drop(locks.acquire(id).await);
        locks.release(id).await;
        assert!(locks.inner.lock().await.is_empty());
    }
}
