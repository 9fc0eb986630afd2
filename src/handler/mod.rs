//! Outbound orchestration.
//!
//! [`Handler`] wires the pieces together: a [`SessionPool`] sharing a
//! [`SubmitWindow`] with the [`InboundDispatcher`], a [`RateLimiter`] reset
//! by an owned background task, and the [`MessageTemplate`] used to build
//! each submission. [`Handler::send_and_receive`] is the long-running
//! outbound loop; inbound traffic is handled independently by each
//! session's reader task.

mod error;

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

pub use error::{HandlerError, SendError};
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    dispatch::{InboundDispatcher, MessageCallback},
    message::{MessageTemplate, OutboundMessage},
    metrics,
    pool::{SessionPool, SubmitError, SubmitWindow},
    rate_limit::{RateLimiter, ResetTask},
    session::{Session, SessionConnector},
};

/// A message that was not sent, with the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedMessage {
    /// Text that was being sent.
    pub text: String,
    /// Rendered error.
    pub error: String,
}

/// Outcome of [`Handler::send_and_receive`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Messages written to a session.
    pub sent: usize,
    /// Messages that could not be sent.
    pub failed: Vec<FailedMessage>,
    /// Whether the loop stopped on cancellation before draining its input.
    pub cancelled: bool,
}

/// Drives submissions through a pool of sessions.
#[derive(Debug)]
pub struct Handler<S: Session> {
    pool: Arc<SessionPool<S>>,
    limiter: Arc<RateLimiter>,
    dispatcher: Arc<InboundDispatcher>,
    template: MessageTemplate,
    backoff: Duration,
    reset_task: Mutex<Option<ResetTask>>,
}

impl<S: Session> Handler<S> {
    /// Validate `config`, bind the session pool and start the limiter.
    ///
    /// Completed inbound messages are passed to `on_message`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Config`] for invalid configuration and
    /// [`HandlerError::Connect`] if any session fails to bind.
    pub async fn connect<C>(
        config: &Config,
        connector: &C,
        on_message: MessageCallback,
    ) -> Result<Self, HandlerError>
    where
        C: SessionConnector<Session = S>,
    {
        config.validate()?;
        let window = Arc::new(SubmitWindow::new(config.max_outstanding));
        let dispatcher = Arc::new(InboundDispatcher::new(
            Arc::clone(&window),
            config.reassembly,
            on_message,
        ));
        let pool = SessionPool::connect(
            connector,
            config.pool_size.get(),
            window,
            dispatcher.handler(),
        )
        .await
        .map_err(HandlerError::Connect)?;
        Ok(Self::from_parts(Arc::new(pool), dispatcher, config))
    }

    /// Assemble a handler from an existing pool and dispatcher.
    ///
    /// The dispatcher must feed the pool's window. Must be called from
    /// within a Tokio runtime.
    #[must_use]
    pub fn from_parts(
        pool: Arc<SessionPool<S>>,
        dispatcher: Arc<InboundDispatcher>,
        config: &Config,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.global_limit,
            config.per_session_limit,
        ));
        let reset_task = limiter.spawn_reset(config.reset_interval);
        Self {
            pool,
            limiter,
            dispatcher,
            template: config.message_template(),
            backoff: config.backoff,
            reset_task: Mutex::new(Some(reset_task)),
        }
    }

    /// Build and submit `text` once.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Message`] if the text cannot be encoded and
    /// [`SendError::Submit`] otherwise, including
    /// [`SubmitError::RateLimited`] rather than waiting.
    pub async fn try_send(&self, text: &str) -> Result<(), SendError> {
        let message = self.template.build(text)?;
        self.submit(&message, None).await?;
        Ok(())
    }

    async fn submit(
        &self,
        message: &OutboundMessage,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), SubmitError> {
        let lent = self.pool.acquire()?;
        let reservation = match cancel {
            Some(cancel) => self.pool.reserve_until(cancel).await?,
            None => self.pool.reserve().await?,
        };
        // Quota is charged only once a slot is held. Dropping the
        // reservation on rejection frees the slot.
        if !self.limiter.allow(lent.id()) {
            metrics::inc_rate_limited();
            return Err(SubmitError::RateLimited);
        }
        SessionPool::send_reserved(&lent, message, reservation).await
    }

    /// Submit every message in order until the input is drained, the pool
    /// closes, or `cancel` fires.
    ///
    /// Exhausted-pool and rate-limit rejections pause for the configured
    /// backoff and retry the same message. Encoding and transport failures
    /// are recorded in the report and the loop moves on.
    pub async fn send_and_receive<I>(&self, messages: I, cancel: &CancellationToken) -> SendReport
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut report = SendReport::default();
        'messages: for text in messages {
            let text: String = text.into();
            let message = match self.template.build(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!(%text, error = %e, "message cannot be encoded");
                    report.failed.push(FailedMessage {
                        text,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            loop {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'messages;
                }
                match self.submit(&message, Some(cancel)).await {
                    Ok(()) => {
                        report.sent += 1;
                        break;
                    }
                    Err(e) if e.is_retryable() => {
                        debug!(%text, error = %e, backoff = ?self.backoff, "backing off");
                        select! {
                            biased;
                            () = cancel.cancelled() => {}
                            () = sleep(self.backoff) => {}
                        }
                    }
                    Err(SubmitError::Cancelled) => {
                        report.cancelled = true;
                        break 'messages;
                    }
                    Err(e @ SubmitError::PoolClosed) => {
                        warn!(%text, "pool closed; stopping send loop");
                        report.failed.push(FailedMessage {
                            text,
                            error: e.to_string(),
                        });
                        break 'messages;
                    }
                    Err(e) => {
                        error!(%text, error = %e, "submit failed");
                        report.failed.push(FailedMessage {
                            text,
                            error: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }
        if report.cancelled {
            info!(sent = report.sent, "send loop cancelled");
        } else {
            info!(sent = report.sent, failed = report.failed.len(), "send loop finished");
        }
        report
    }

    /// Stop the limiter reset task and close every session.
    pub async fn close(&self) {
        let task = self
            .reset_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.stop().await;
        }
        self.pool.close().await;
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<SessionPool<S>> { &self.pool }

    /// The rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> { &self.limiter }

    /// The inbound dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<InboundDispatcher> { &self.dispatcher }
}

#[cfg(test)]
mod tests;
