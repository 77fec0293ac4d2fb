//! In-memory conversation sessions
//!
//! Sessions are created on the first query for a key and kept for the life of
//! the process. Each session owns its history and the correlation state that
//! every dispatch of its turns shares.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use crate::correlation::CorrelationState;
use crate::runtime::Content;

/// Shared handle; the async mutex serializes turns of one session
pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    history: Vec<Content>,
    correlation: Arc<CorrelationState>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(key: SessionKey) -> Self {
        Self {
            key,
            history: Vec::new(),
            correlation: Arc::new(CorrelationState::new()),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.key.session_id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn push(&mut self, content: Content) {
        self.history.push(content);
    }

    pub fn correlation(&self) -> Arc<CorrelationState> {
        self.correlation.clone()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.read().get(key).cloned()
    }

    /// Look the session up, creating an empty one if missing
    pub fn get_or_create(&self, key: SessionKey) -> SessionHandle {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(session_id = %key.session_id, user_id = %key.user_id, "Creating session");
                Arc::new(Mutex::new(Session::new(key.clone())))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(session_id: &str) -> SessionKey {
        SessionKey::new("Host_Agent", "host_agent", session_id)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_session() {
        let store = SessionStore::new();
        assert!(store.get(&key("s1")).is_none());

        let first = store.get_or_create(key("s1"));
        first.lock().await.push(Content::user_text("hello"));

        let again = store.get_or_create(key("s1"));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().await.history().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.get_or_create(key("a"));
        let b = store.get_or_create(key("b"));

        let a_ids = a.lock().await.correlation().next();
        let b_ids = b.lock().await.correlation().next();

        assert_ne!(a_ids.task_id, b_ids.task_id);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_correlation_survives_across_lookups() {
        let store = SessionStore::new();
        let task_id = store.get_or_create(key("s")).lock().await.correlation().next().task_id;

        let session = store.get(&key("s")).unwrap();
        let later = session.lock().await.correlation().next();
        assert_eq!(later.task_id, task_id);
    }

    #[test]
    fn test_user_id_is_part_of_the_key() {
        let store = SessionStore::new();
        store.get_or_create(SessionKey::new("Host_Agent", "alice", "s"));
        store.get_or_create(SessionKey::new("Host_Agent", "bob", "s"));
        assert_eq!(store.len(), 2);
    }
}
