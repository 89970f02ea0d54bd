//! In-memory conversation history, keyed by session id.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::Message;

/// Maximum messages kept per session; oldest are dropped first.
const HISTORY_CAP: usize = 20;

/// Process-lifetime store of per-session message history.
///
/// Only the final user/assistant text of each turn is kept; tool traffic is
/// ephemeral within a turn. Distinct session ids are independent. Two
/// concurrent turns on the *same* id are a caller error: the map stays
/// consistent but their interleaving in the history is unspecified.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<String, Vec<Message>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Message>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of a session's history, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.lock().get(session_id).cloned().unwrap_or_default()
    }

    /// Append one completed turn (user message and final reply).
    pub fn append_turn(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.lock();
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(Message::user(user));
        history.push(Message::assistant(assistant));
        if history.len() > HISTORY_CAP {
            let excess = history.len() - HISTORY_CAP;
            history.drain(..excess);
        }
    }

    /// Number of stored messages for a session.
    pub fn len(&self, session_id: &str) -> usize {
        self.lock().get(session_id).map_or(0, Vec::len)
    }

    /// Whether the session has no history.
    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Drop a session's history.
    pub fn clear(&self, session_id: &str) {
        self.lock().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn turns_accumulate_in_order() {
        let store = SessionStore::new();
        store.append_turn("s1", "你好", "您好！");
        store.append_turn("s1", "推荐景点", "推荐故宫。");

        let history = store.history("s1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "你好");
        assert_eq!(history[3].content, "推荐故宫。");
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        store.append_turn("a", "hi", "hello");
        assert!(store.is_empty("b"));
        assert_eq!(store.len("a"), 2);
    }

    #[test]
    fn history_is_capped_at_twenty_messages() {
        let store = SessionStore::new();
        for i in 0..30 {
            store.append_turn("s", &format!("q{i}"), &format!("a{i}"));
        }
        let history = store.history("s");
        assert_eq!(history.len(), 20);
        // Oldest turns dropped, newest kept.
        assert_eq!(history.last().unwrap().content, "a29");
        assert_eq!(history.first().unwrap().content, "q20");
    }

    #[test]
    fn clear_evicts_session() {
        let store = SessionStore::new();
        store.append_turn("s", "q", "a");
        store.clear("s");
        assert!(store.is_empty("s"));
    }
}
