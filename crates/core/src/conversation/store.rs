use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::conversation::states::{ConversationState, ConversationStep, SessionId};

/// Per-chat conversation state. Idle sessions are never stored; the map only
/// holds chats in the middle of a calculation.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, ConversationState>>,
}

impl SessionStore {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, ConversationState>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Current state for the chat, or a fresh idle state.
    pub fn load(&self, session: SessionId, now: DateTime<Utc>) -> ConversationState {
        self.sessions().get(&session).cloned().unwrap_or_else(|| ConversationState::new(now))
    }

    pub fn save(&self, session: SessionId, state: ConversationState) {
        if state.step == ConversationStep::Idle {
            self.sessions().remove(&session);
        } else {
            self.sessions().insert(session, state);
        }
    }

    pub fn remove(&self, session: SessionId) -> bool {
        self.sessions().remove(&session).is_some()
    }

    pub fn step(&self, session: SessionId) -> Option<ConversationStep> {
        self.sessions().get(&session).map(|state| state.step)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions untouched for longer than `ttl`; returns how many went.
    pub fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, state| now - state.touched_at <= ttl);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::SessionStore;
    use crate::conversation::states::{ConversationState, ConversationStep, SessionId};

    #[test]
    fn idle_state_is_not_stored() {
        let store = SessionStore::default();
        let now = Utc::now();
        let mut state = store.load(SessionId(1), now);
        assert_eq!(state.step, ConversationStep::Idle);

        store.save(SessionId(1), state.clone());
        assert!(store.is_empty());

        state.step = ConversationStep::AwaitingSearch;
        store.save(SessionId(1), state);
        assert_eq!(store.step(SessionId(1)), Some(ConversationStep::AwaitingSearch));

        let mut finished = store.load(SessionId(1), now);
        finished.step = ConversationStep::Idle;
        store.save(SessionId(1), finished);
        assert_eq!(store.step(SessionId(1)), None);
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::default();
        let now = Utc::now();
        for (id, step) in [(1, ConversationStep::AwaitingQty), (2, ConversationStep::AwaitingSearch)] {
            let mut state = ConversationState::new(now);
            state.step = step;
            store.save(SessionId(id), state);
        }

        assert!(store.remove(SessionId(1)));
        assert_eq!(store.step(SessionId(2)), Some(ConversationStep::AwaitingSearch));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn purge_drops_only_stale_sessions() {
        let store = SessionStore::default();
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        for (id, age_hours) in [(1, 30), (2, 2)] {
            let mut state = ConversationState::new(start - Duration::hours(age_hours));
            state.step = ConversationStep::AwaitingCustomerName;
            store.save(SessionId(id), state);
        }

        assert_eq!(store.purge_expired(start, Duration::hours(24)), 1);
        assert_eq!(store.step(SessionId(1)), None);
        assert_eq!(store.step(SessionId(2)), Some(ConversationStep::AwaitingCustomerName));
    }
}
