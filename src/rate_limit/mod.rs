//! Fixed-window submission counters.
//!
//! [`RateLimiter`] enforces two independent ceilings: one across every
//! session and one per session. Both counters are cleared together by
//! [`RateLimiter::reset`], normally driven by the task returned from
//! [`RateLimiter::spawn_reset`].

mod reset;

use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
};

pub use reset::ResetTask;
use serde::Serialize;

use crate::session::SessionId;

#[derive(Debug, Default)]
struct Counters {
    global: usize,
    sessions: HashMap<SessionId, usize>,
}

/// Point-in-time view of the limiter counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RateLimiterSnapshot {
    /// Submissions allowed in the current window.
    pub global: usize,
    /// Per-session submissions allowed in the current window, sorted by id.
    pub sessions: Vec<(SessionId, usize)>,
}

/// Global and per-session submission limiter.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use smpp_pool::{rate_limit::RateLimiter, session::SessionId};
///
/// let two = NonZeroUsize::new(2).expect("non-zero");
/// let one = NonZeroUsize::new(1).expect("non-zero");
/// let limiter = RateLimiter::new(two, one);
/// let session = SessionId::new(1);
/// assert!(limiter.allow(session));
/// assert!(!limiter.allow(session));
/// limiter.reset();
/// assert!(limiter.allow(session));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    global_limit: NonZeroUsize,
    per_session_limit: NonZeroUsize,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    /// Create a limiter with the given ceilings.
    #[must_use]
    pub fn new(global_limit: NonZeroUsize, per_session_limit: NonZeroUsize) -> Self {
        Self {
            global_limit,
            per_session_limit,
            counters: Mutex::new(Counters::default()),
        }
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one submission on `session` if both ceilings allow it.
    ///
    /// Returns `false` without touching any counter when either ceiling is
    /// reached. Never blocks on anything but the counter lock.
    pub fn allow(&self, session: SessionId) -> bool {
        let mut counters = self.counters();
        if counters.global >= self.global_limit.get() {
            return false;
        }
        let used = counters.sessions.get(&session).copied().unwrap_or(0);
        if used >= self.per_session_limit.get() {
            return false;
        }
        counters.global += 1;
        counters.sessions.insert(session, used + 1);
        true
    }

    /// Zero every counter.
    pub fn reset(&self) {
        let mut counters = self.counters();
        counters.global = 0;
        counters.sessions.clear();
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let counters = self.counters();
        let mut sessions: Vec<_> = counters
            .sessions
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect();
        sessions.sort_unstable();
        RateLimiterSnapshot {
            global: counters.global,
            sessions,
        }
    }

    /// Ceiling across all sessions.
    #[must_use]
    pub const fn global_limit(&self) -> NonZeroUsize { self.global_limit }

    /// Ceiling for one session.
    #[must_use]
    pub const fn per_session_limit(&self) -> NonZeroUsize { self.per_session_limit }
}
