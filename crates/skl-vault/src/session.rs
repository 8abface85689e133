//! Per-session state owned by the host's event handling.
//!
//! Entries live from the first event of a session until the host calls
//! [`SessionRegistry::remove`] on session deletion. The registry is a value
//! the host injects where it is needed; there is no process-global map.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Session-scoped state keyed by session id.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    sessions: Mutex<HashMap<String, S>>,
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> SessionRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, S>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run `f` on the state of `session_id`, creating it on first use.
    pub fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut S) -> R) -> R
    where
        S: Default,
    {
        let mut map = self.map();
        let state = map.entry(session_id.to_string()).or_default();
        f(state)
    }

    /// Snapshot of a session's state.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<S>
    where
        S: Clone,
    {
        self.map().get(session_id).cloned()
    }

    /// Tear down a session, returning its final state.
    pub fn remove(&self, session_id: &str) -> Option<S> {
        self.map().remove(session_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

/// Extraction bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionState {
    /// Modules with an extraction currently running.
    pub in_flight: BTreeSet<String>,
    /// Whether the user has been told about learned skills this session.
    pub notified: bool,
}

impl ExtractionState {
    /// Mark `module` as being extracted. Returns `false` if it already was,
    /// so the caller can skip a duplicate extraction.
    pub fn begin(&mut self, module: &str) -> bool {
        self.in_flight.insert(module.to_string())
    }

    pub fn finish(&mut self, module: &str) {
        self.in_flight.remove(module);
    }

    /// Returns `true` exactly once per session.
    pub fn take_notification(&mut self) -> bool {
        !std::mem::replace(&mut self.notified, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn sessions_are_created_lazily_and_removed_explicitly() {
        let registry: SessionRegistry<ExtractionState> = SessionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.get("s1"), None);

        assert!(registry.with_session("s1", |s| s.begin("src/auth")));
        assert!(!registry.with_session("s1", |s| s.begin("src/auth")));
        registry.with_session("s2", |s| s.begin("src/db"));
        assert_eq!(registry.len(), 2);

        let removed = registry.remove("s1").unwrap();
        assert!(removed.in_flight.contains("src/auth"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove("s1"), None);
    }

    #[test]
    fn extraction_state_transitions() {
        let mut state = ExtractionState::default();
        assert!(state.begin("lib"));
        state.finish("lib");
        assert!(state.begin("lib"));

        assert!(state.take_notification());
        assert!(!state.take_notification());
    }

    #[test]
    fn concurrent_sessions_do_not_interfere() {
        let registry = Arc::new(SessionRegistry::<ExtractionState>::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = format!("session-{}", i % 2);
                    registry.with_session(&id, |s| s.begin(&format!("module-{i}")));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("session-0").unwrap().in_flight.len(), 4);
        assert_eq!(registry.get("session-1").unwrap().in_flight.len(), 4);
    }
}
