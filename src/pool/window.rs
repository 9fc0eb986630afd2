//! Outstanding-request window providing submit backpressure.
//!
//! Every slot is one permit of a [`Semaphore`]. A submitter first takes a
//! [`Reservation`], which holds a permit while the request is written. A
//! committed reservation becomes an outstanding request and keeps its permit
//! until [`SubmitWindow::acknowledge`] returns it. A reservation dropped
//! without committing returns its permit straight away.
//!
//! Waiting happens on the semaphore, never while holding the counter lock,
//! so acknowledgments are always able to make progress.
//!
//! A response can overtake the commit of its own request. Such an early
//! acknowledgment is credited to the reservations still in flight, and the
//! next commit returns its permit instead of counting as outstanding.

use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::Semaphore;
use tracing::warn;

use crate::metrics;

#[derive(Debug, Default)]
struct Counts {
    outstanding: usize,
    reserved: usize,
    early: usize,
}

/// The window was closed while waiting for a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowClosed;

/// Bounded count of unacknowledged submissions.
#[derive(Debug)]
pub struct SubmitWindow {
    max_outstanding: NonZeroUsize,
    permits: Semaphore,
    counts: Mutex<Counts>,
}

impl SubmitWindow {
    /// Create a window admitting at most `max_outstanding` requests.
    #[must_use]
    pub fn new(max_outstanding: NonZeroUsize) -> Self {
        Self {
            max_outstanding,
            permits: Semaphore::new(max_outstanding.get()),
            counts: Mutex::new(Counts::default()),
        }
    }

    fn counts(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`WindowClosed`] if the window is closed before or while
    /// waiting.
    pub async fn reserve(&self) -> Result<Reservation<'_>, WindowClosed> {
        let permit = self.permits.acquire().await.map_err(|_| WindowClosed)?;
        permit.forget();
        self.counts().reserved += 1;
        Ok(Reservation {
            window: self,
            committed: false,
        })
    }

    /// Release one outstanding slot.
    ///
    /// Returns `false` and leaves the window untouched if nothing is
    /// outstanding.
    pub fn acknowledge(&self) -> bool {
        let outstanding = {
            let mut counts = self.counts();
            if counts.outstanding == 0 {
                if counts.reserved > counts.early {
                    counts.early += 1;
                    return true;
                }
                drop(counts);
                warn!("acknowledgment received with nothing outstanding");
                return false;
            }
            counts.outstanding -= 1;
            counts.outstanding
        };
        self.permits.add_permits(1);
        metrics::set_outstanding(outstanding);
        true
    }

    /// Number of committed, unacknowledged requests.
    #[must_use]
    pub fn outstanding(&self) -> usize { self.counts().outstanding }

    /// Configured cap.
    #[must_use]
    pub const fn max_outstanding(&self) -> usize { self.max_outstanding.get() }

    /// Wake every waiter with [`WindowClosed`] and refuse new reservations.
    pub fn close(&self) { self.permits.close(); }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.permits.is_closed() }

    fn commit(&self) {
        let outstanding = {
            let mut counts = self.counts();
            counts.reserved -= 1;
            if counts.early > 0 {
                counts.early -= 1;
                drop(counts);
                self.permits.add_permits(1);
                return;
            }
            counts.outstanding += 1;
            counts.outstanding
        };
        metrics::set_outstanding(outstanding);
    }

    fn rollback(&self) {
        {
            let mut counts = self.counts();
            counts.reserved -= 1;
            counts.early = counts.early.min(counts.reserved);
        }
        self.permits.add_permits(1);
    }
}

/// A slot held while a request is being written.
///
/// Call [`commit`](Self::commit) once the request is on the wire; dropping
/// the reservation instead returns the slot.
#[derive(Debug)]
#[must_use = "dropping a reservation releases the slot"]
pub struct Reservation<'a> {
    window: &'a SubmitWindow,
    committed: bool,
}

impl Reservation<'_> {
    /// Turn the reservation into an outstanding request.
    pub fn commit(mut self) {
        self.committed = true;
        self.window.commit();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.window.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;
    use tracing_test::traced_test;

    use super::*;

    fn window(max: usize) -> SubmitWindow {
        SubmitWindow::new(NonZeroUsize::new(max).expect("non-zero"))
    }

    #[tokio::test]
    async fn rollback_frees_the_slot() {
        let window = window(1);
        let reservation = window.reserve().await.expect("open");
        drop(reservation);
        assert_eq!(window.outstanding(), 0);
        window.reserve().await.expect("slot returned").commit();
        assert_eq!(window.outstanding(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_window_waits_for_acknowledgment() {
        let window = Arc::new(window(1));
        window.reserve().await.expect("open").commit();

        let waiter = {
            let window = Arc::clone(&window);
            tokio::spawn(async move {
                window.reserve().await.expect("open").commit();
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        assert!(window.acknowledge());
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter resumes")
            .expect("task");
        assert_eq!(window.outstanding(), 1);
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let window = Arc::new(window(1));
        window.reserve().await.expect("open").commit();
        let waiter = {
            let window = Arc::clone(&window);
            tokio::spawn(async move { window.reserve().await.map(Reservation::commit) })
        };
        tokio::task::yield_now().await;
        window.close();
        assert_eq!(waiter.await.expect("task"), Err(WindowClosed));
        assert!(window.is_closed());
    }

    #[tokio::test]
    async fn acknowledgment_overtaking_its_commit_frees_the_slot() {
        let window = window(1);
        let reservation = window.reserve().await.expect("open");
        assert!(window.acknowledge());
        reservation.commit();
        assert_eq!(window.outstanding(), 0);

        timeout(Duration::from_secs(1), window.reserve())
            .await
            .expect("slot returned")
            .expect("open")
            .commit();
        assert_eq!(window.outstanding(), 1);
    }

    #[traced_test]
    #[test]
    fn stray_acknowledgment_is_ignored() {
        let window = window(2);
        assert!(!window.acknowledge());
        assert_eq!(window.outstanding(), 0);
        assert!(logs_contain("nothing outstanding"));
    }
}
