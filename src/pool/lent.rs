//! Guard for a session borrowed from the pool.

use std::{fmt, ops::Deref, sync::Arc};

use super::SessionPool;
use crate::session::Session;

/// Exclusive loan of one session.
///
/// The session returns to the pool when the guard is dropped, on every exit
/// path, unless the pool was closed in the meantime.
pub struct LentSession<'a, S: Session> {
    pool: &'a SessionPool<S>,
    session: Arc<S>,
}

impl<'a, S: Session> LentSession<'a, S> {
    pub(super) fn new(pool: &'a SessionPool<S>, session: Arc<S>) -> Self { Self { pool, session } }
}

impl<S: Session> Deref for LentSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &Self::Target { &self.session }
}

impl<S: Session> Drop for LentSession<'_, S> {
    fn drop(&mut self) { self.pool.release(Arc::clone(&self.session)); }
}

impl<S: Session> fmt::Debug for LentSession<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LentSession")
            .field("session", &self.session.id())
            .finish_non_exhaustive()
    }
}
