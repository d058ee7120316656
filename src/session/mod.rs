/*
 * Session Registry
 *
 * The set of sessions the secure world reported as open for one context.
 *
 * Design:
 * - Keyed by session id in an ordered map, ids unique at any instant
 * - One spin Mutex guards the map; critical sections only touch the map,
 *   never the channel
 * - A session is visible to `find` from a successful open until the close
 *   that removes it
 *
 * `find` answers "did this session exist at the time of the check". Nothing
 * pins a session after `find` returns, so an invoke that found its session
 * may still race a concurrent close of the same id. Callers accept that the
 * secure world is the final arbiter in that window.
 */

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use spin::Mutex;

/// Session identifier assigned by the secure world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u32);

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// An open session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self { id }
    }
}

/// Registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A session with this id is already registered
    Duplicate(SessionId),
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegistryError::Duplicate(id) => write!(f, "{} already registered", id),
        }
    }
}

/// Per-context session registry
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub const fn new() -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a session the secure world just opened
    pub fn add(&self, session: Session) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session.id) {
            return Err(RegistryError::Duplicate(session.id));
        }
        sessions.insert(session.id, session);
        log::debug!("{} added to registry", session.id);
        Ok(())
    }

    /// Look up a session; only valid as of the moment of the check
    pub fn find(&self, id: SessionId) -> Option<Session> {
        self.sessions.lock().get(&id).copied()
    }

    /// Remove a session, returning it if it was registered
    ///
    /// Check and removal happen under one lock, so of two racing removals
    /// for the same id exactly one gets `Some`.
    pub fn remove(&self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.lock().remove(&id);
        if removed.is_some() {
            log::debug!("{} removed from registry", id);
        }
        removed
    }

    /// Remove every session, returning them in id order
    pub fn drain(&self) -> Vec<Session> {
        let mut sessions = self.sessions.lock();
        let drained = sessions.values().copied().collect();
        sessions.clear();
        drained
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// All registered session ids (for debugging)
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().keys().copied().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn find_sees_exactly_what_was_added_and_not_removed() {
        let registry = SessionRegistry::new();
        assert!(registry.find(SessionId(1)).is_none());

        registry.add(Session::new(SessionId(1))).unwrap();
        registry.add(Session::new(SessionId(2))).unwrap();
        assert_eq!(registry.find(SessionId(1)), Some(Session::new(SessionId(1))));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(SessionId(1)).is_some());
        assert!(registry.find(SessionId(1)).is_none());
        assert!(registry.remove(SessionId(1)).is_none());
        assert_eq!(registry.ids(), vec![SessionId(2)]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = SessionRegistry::new();
        registry.add(Session::new(SessionId(9))).unwrap();
        assert_eq!(
            registry.add(Session::new(SessionId(9))),
            Err(RegistryError::Duplicate(SessionId(9)))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drain_empties_the_registry() {
        let registry = SessionRegistry::new();
        for id in [3, 1, 2] {
            registry.add(Session::new(SessionId(id))).unwrap();
        }
        let drained: Vec<_> = registry.drain().into_iter().map(|s| s.id.0).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_removals_of_one_id_succeed_once() {
        let registry = Arc::new(SessionRegistry::new());
        registry.add(Session::new(SessionId(42))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.remove(SessionId(42)).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        assert!(registry.is_empty());
    }
}
