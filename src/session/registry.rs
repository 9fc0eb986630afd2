//! Registry of every session owned by a pool.
//!
//! `SessionRegistry` holds a strong reference to each session regardless of
//! whether it is idle or lent out, so teardown can reach all of them. Lending
//! itself is tracked by the pool; the registry only answers "which sessions
//! exist".
use std::sync::Arc;

use dashmap::DashMap;

use super::{Session, SessionId};

/// Concurrent registry of sessions keyed by [`SessionId`].
pub struct SessionRegistry<S>(DashMap<SessionId, Arc<S>>);

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self { Self(DashMap::new()) }
}

impl<S: Session> SessionRegistry<S> {
    /// Register a session under its own identifier.
    pub fn insert(&self, session: Arc<S>) { self.0.insert(session.id(), session); }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Identifiers of every registered session, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.0.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot every registered session.
    ///
    /// The snapshot is collected before returning so no shard lock is held
    /// while callers await on the sessions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<S>> {
        self.0.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}
