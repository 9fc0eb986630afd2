//! Error types for the SMPP transport.

use std::{io, time::Duration};

use thiserror::Error;

use crate::session::CommandStatus;

/// Failures while decoding or encoding a PDU body.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PduError {
    /// The body ended before `field` could be read.
    #[error("PDU truncated while reading {field}")]
    Truncated {
        /// Field being read.
        field: &'static str,
    },
    /// A C-octet string was not terminated within its maximum width.
    #[error("field {field} is not terminated within {max} octets")]
    Unterminated {
        /// Field being read.
        field: &'static str,
        /// Maximum width including the terminator.
        max: usize,
    },
    /// A value is too wide for its field.
    #[error("field {field} is {len} octets; limit is {max}")]
    FieldTooLong {
        /// Field being written.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// The user data header does not fit in the short message.
    #[error("user data header is malformed")]
    MalformedUdh,
}

/// Errors raised by a session's transport.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The session is closed or its connection was lost.
    #[error("session closed")]
    Closed,
    /// An operation did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured limit.
        after: Duration,
    },
    /// The SMSC refused the bind request.
    #[error("bind rejected with status {0}")]
    BindRejected(CommandStatus),
    /// The SMSC answered the bind with an unrelated PDU.
    #[error("unexpected {0} while binding")]
    UnexpectedPdu(&'static str),
    /// A PDU could not be encoded or decoded.
    #[error("malformed PDU: {0}")]
    Pdu(#[from] PduError),
}
