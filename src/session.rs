//! Cross-session store.
//!
//! Sessions are independent; the store is the only structure shared between
//! them. Insert, lookup, and delete are each atomic under one async lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::harness::HarnessResult;
use crate::scratchpad::Scratchpad;

/// A finished (or archived) session.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub scratchpad: Scratchpad,
    pub result: Option<HarnessResult>,
}

/// Shared map from session id to stored session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, StoredSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: StoredSession) {
        let id = session.scratchpad.session_id.clone();
        self.inner.write().await.insert(id, session);
    }

    pub async fn get(&self, session_id: &str) -> Option<StoredSession> {
        self.inner.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<StoredSession> {
        self.inner.write().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str) -> StoredSession {
        StoredSession {
            scratchpad: Scratchpad::new(id, "title"),
            result: None,
        }
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);

        store.insert(stored("s1")).await;
        store.insert(stored("s2")).await;
        assert_eq!(store.len().await, 2);

        let fetched = store.get("s1").await.unwrap();
        assert_eq!(fetched.scratchpad.session_id, "s1");

        assert!(store.remove("s1").await.is_some());
        assert!(store.get("s1").await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SessionStore::new();
        let clone = store.clone();
        store.insert(stored("shared")).await;
        assert!(clone.get("shared").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        let store = SessionStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(stored(&format!("s{}", i))).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 16);
    }
}
