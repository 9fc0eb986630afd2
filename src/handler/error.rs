//! Handler error types.

use thiserror::Error;

use crate::{config::ConfigError, message::MessageError, pool::SubmitError, smpp::TransportError};

/// Failures while building a [`Handler`](super::Handler).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A session could not be connected or bound.
    #[error("failed to connect session pool: {0}")]
    Connect(#[source] TransportError),
}

/// Failures of a single send attempt.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SendError {
    /// The text could not be turned into a message.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// The message could not be submitted.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
