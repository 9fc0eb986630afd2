//! Errors returned to submitters.

use thiserror::Error;

use crate::smpp::TransportError;

/// Reasons a submission did not reach the SMSC.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Every session is currently lent out.
    #[error("no session available")]
    NoSessionAvailable,
    /// The pool has been closed.
    #[error("session pool is closed")]
    PoolClosed,
    /// The caller cancelled while waiting for a window slot.
    #[error("submission cancelled")]
    Cancelled,
    /// The rate limiter refused the attempt.
    #[error("rate limit reached")]
    RateLimited,
    /// The session failed to send the request.
    #[error("transport send failed: {0}")]
    Transport(#[source] TransportError),
}

impl SubmitError {
    /// Whether retrying the same message after a pause may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NoSessionAvailable | Self::RateLimited)
    }
}
