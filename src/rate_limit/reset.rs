//! Periodic counter reset owned by the caller.

use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RateLimiter;

/// Handle to the background task resetting a [`RateLimiter`].
///
/// Dropping the handle cancels the task; [`stop`](Self::stop) also waits for
/// it to finish.
#[derive(Debug)]
pub struct ResetTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ResetTask {
    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "rate limiter reset task failed");
        }
    }

    /// Whether the task has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.token.is_cancelled() }
}

impl Drop for ResetTask {
    fn drop(&mut self) { self.token.cancel(); }
}

impl RateLimiter {
    /// Spawn a task that calls [`reset`](Self::reset) every `period`.
    ///
    /// The first reset happens one full period after the call. Must be
    /// called from within a Tokio runtime.
    #[must_use = "dropping the handle stops the reset task"]
    pub fn spawn_reset(self: &Arc<Self>, period: Duration) -> ResetTask {
        let token = CancellationToken::new();
        let limiter = Arc::clone(self);
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        limiter.reset();
                        debug!("rate limiter counters reset");
                    }
                }
            }
        });
        ResetTask {
            token,
            handle: Some(handle),
        }
    }
}
