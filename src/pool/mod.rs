//! Fixed-size session pool with outstanding-request backpressure.
//!
//! The pool lends each idle session to one caller at a time and bounds the
//! number of submissions still waiting for an acknowledgment through a
//! shared [`SubmitWindow`]. Two independent limits therefore apply to a
//! submission:
//!
//! - a session must be idle, or [`acquire`](SessionPool::acquire) fails at
//!   once with [`SubmitError::NoSessionAvailable`];
//! - the window must have room, or [`submit_on`](SessionPool::submit_on)
//!   waits until an acknowledgment frees a slot or the pool closes.
//!
//! Acknowledgments arrive on the sessions' inbound streams and reach the
//! window through [`SessionPool::acknowledge`] or a shared handle to the
//! window itself.

mod error;
mod lent;
mod window;

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub use error::SubmitError;
use futures::future::join_all;
pub use lent::LentSession;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
pub use window::{Reservation, SubmitWindow, WindowClosed};

use crate::{
    message::OutboundMessage,
    metrics,
    session::{NotificationHandler, Session, SessionConnector, SessionId, SessionRegistry},
    smpp::TransportError,
};

#[derive(Debug)]
struct Slots<S> {
    available: VecDeque<Arc<S>>,
    lent: usize,
    closed: bool,
}

/// Pool of bound sessions sharing one submit window.
pub struct SessionPool<S: Session> {
    sessions: SessionRegistry<S>,
    slots: Mutex<Slots<S>>,
    window: Arc<SubmitWindow>,
}

impl<S: Session> fmt::Debug for SessionPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("sessions", &self.sessions.ids())
            .field("available", &self.available_count())
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl<S: Session> SessionPool<S> {
    /// Build a pool from already bound sessions.
    #[must_use]
    pub fn new(sessions: impl IntoIterator<Item = S>, window: Arc<SubmitWindow>) -> Self {
        let registry = SessionRegistry::default();
        let available: VecDeque<Arc<S>> = sessions.into_iter().map(Arc::new).collect();
        for session in &available {
            registry.insert(Arc::clone(session));
        }
        Self {
            sessions: registry,
            slots: Mutex::new(Slots {
                available,
                lent: 0,
                closed: false,
            }),
            window,
        }
    }

    /// Connect `size` sessions through `connector`.
    ///
    /// Sessions are numbered from 1. Every session routes its inbound
    /// notifications to `on_notification`.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransportError`] if any session fails to bind.
    /// Sessions that did bind are closed before returning.
    pub async fn connect<C>(
        connector: &C,
        size: usize,
        window: Arc<SubmitWindow>,
        on_notification: NotificationHandler,
    ) -> Result<Self, TransportError>
    where
        C: SessionConnector<Session = S>,
    {
        let attempts = (1..=size as u64).map(|id| {
            let on_notification = Arc::clone(&on_notification);
            async move {
                let id = SessionId::new(id);
                connector
                    .connect(id, on_notification)
                    .await
                    .inspect_err(|e| warn!(session = %id, error = %e, "session failed to bind"))
            }
        });
        let mut bound = Vec::with_capacity(size);
        let mut failure = None;
        for result in join_all(attempts).await {
            match result {
                Ok(session) => bound.push(session),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            join_all(bound.iter().map(|session| session.close())).await;
            return Err(e);
        }
        info!(sessions = bound.len(), "session pool ready");
        Ok(Self::new(bound, window))
    }

    fn slots(&self) -> MutexGuard<'_, Slots<S>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow an idle session without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::PoolClosed`] after [`close`](Self::close) and
    /// [`SubmitError::NoSessionAvailable`] when every session is lent out.
    pub fn acquire(&self) -> Result<LentSession<'_, S>, SubmitError> {
        let mut slots = self.slots();
        if slots.closed {
            return Err(SubmitError::PoolClosed);
        }
        let Some(session) = slots.available.pop_front() else {
            drop(slots);
            debug!("no idle session");
            return Err(SubmitError::NoSessionAvailable);
        };
        slots.lent += 1;
        drop(slots);
        Ok(LentSession::new(self, session))
    }

    pub(crate) fn release(&self, session: Arc<S>) {
        let mut slots = self.slots();
        slots.lent = slots.lent.saturating_sub(1);
        if !slots.closed {
            slots.available.push_back(session);
        }
    }

    /// Submit `message` on any idle session.
    ///
    /// # Errors
    ///
    /// See [`acquire`](Self::acquire) and [`submit_on`](Self::submit_on).
    pub async fn submit(&self, message: &OutboundMessage) -> Result<(), SubmitError> {
        let lent = self.acquire()?;
        self.submit_on(&lent, message).await
    }

    /// Submit `message` on an already borrowed session.
    ///
    /// Waits while the window is full. The window slot is kept as an
    /// outstanding request only if the send succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::PoolClosed`] if the pool closes while waiting
    /// for a slot and [`SubmitError::Transport`] if the send fails.
    pub async fn submit_on(
        &self,
        lent: &LentSession<'_, S>,
        message: &OutboundMessage,
    ) -> Result<(), SubmitError> {
        let reservation = self.reserve().await?;
        Self::send_reserved(lent, message, reservation).await
    }

    /// Like [`submit_on`](Self::submit_on), but stops waiting for a window
    /// slot once `cancel` fires.
    ///
    /// Cancellation is only observed before the request is written; a send
    /// that has started always completes.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Cancelled`] if `cancel` fires first, otherwise
    /// the errors of [`submit_on`](Self::submit_on).
    pub async fn submit_on_until(
        &self,
        lent: &LentSession<'_, S>,
        message: &OutboundMessage,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        let reservation = self.reserve_until(cancel).await?;
        Self::send_reserved(lent, message, reservation).await
    }

    /// Wait for a free window slot.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::PoolClosed`] if the pool closes first.
    pub async fn reserve(&self) -> Result<Reservation<'_>, SubmitError> {
        self.window
            .reserve()
            .await
            .map_err(|WindowClosed| SubmitError::PoolClosed)
    }

    /// Wait for a free window slot until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Cancelled`] if `cancel` fires first and
    /// [`SubmitError::PoolClosed`] if the pool closes first.
    pub async fn reserve_until(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Reservation<'_>, SubmitError> {
        select! {
            biased;
            () = cancel.cancelled() => Err(SubmitError::Cancelled),
            reserved = self.reserve() => reserved,
        }
    }

    /// Write `message` on `lent`, committing `reservation` on success.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Transport`] if the send fails; the slot is
    /// returned to the window.
    pub async fn send_reserved(
        lent: &LentSession<'_, S>,
        message: &OutboundMessage,
        reservation: Reservation<'_>,
    ) -> Result<(), SubmitError> {
        if let Err(e) = lent.submit(message).await {
            metrics::inc_submit_failures();
            return Err(SubmitError::Transport(e));
        }
        reservation.commit();
        metrics::inc_submitted();
        Ok(())
    }

    /// Record an acknowledgment, waking one blocked submitter.
    ///
    /// Returns `false` if nothing was outstanding.
    pub fn acknowledge(&self) -> bool { self.window.acknowledge() }

    /// Close the pool and every session, idle or lent.
    ///
    /// Blocked submitters return [`SubmitError::PoolClosed`]. Calls already
    /// writing to a session may still fail with a transport error.
    pub async fn close(&self) {
        {
            let mut slots = self.slots();
            if slots.closed {
                return;
            }
            slots.closed = true;
            slots.available.clear();
        }
        self.window.close();
        let sessions = self.sessions.snapshot();
        join_all(sessions.iter().map(|session| session.close())).await;
        info!(sessions = sessions.len(), "session pool closed");
    }

    /// Shared handle to the submit window.
    #[must_use]
    pub fn window(&self) -> &Arc<SubmitWindow> { &self.window }

    /// Number of sessions owned by the pool.
    #[must_use]
    pub fn total_sessions(&self) -> usize { self.sessions.len() }

    /// Number of idle sessions.
    #[must_use]
    pub fn available_count(&self) -> usize { self.slots().available.len() }

    /// Number of sessions currently lent out.
    #[must_use]
    pub fn lent_count(&self) -> usize { self.slots().lent }

    /// Committed, unacknowledged submissions.
    #[must_use]
    pub fn outstanding(&self) -> usize { self.window.outstanding() }

    /// Cap on unacknowledged submissions.
    #[must_use]
    pub fn max_outstanding(&self) -> usize { self.window.max_outstanding() }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.slots().closed }

    /// Identifiers of every session in the pool.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> { self.sessions.ids() }
}

#[cfg(test)]
mod tests;
