//! Inbound notification model delivered by a session's reader task.

use std::fmt;

use crate::reassembly::ConcatHeader;

/// Protocol command status carried in every response header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandStatus(pub u32);

impl CommandStatus {
    /// `ESME_ROK`: the request succeeded.
    pub const OK: Self = Self(0x0000_0000);
    /// `ESME_RTHROTTLED`: the SMSC is throttling the client.
    pub const THROTTLED: Self = Self(0x0000_0058);
    /// `ESME_RINVMSGLEN`: the PDU body could not be parsed.
    pub const INVALID_MESSAGE_LENGTH: Self = Self(0x0000_0001);
    /// `ESME_RINVCMDID`: the command is not supported.
    pub const INVALID_COMMAND_ID: Self = Self(0x0000_0003);
    /// `ESME_RBINDFAIL`: the bind request was rejected.
    pub const BIND_FAILED: Self = Self(0x0000_000D);

    /// Whether the status signals success.
    #[must_use]
    pub const fn is_ok(self) -> bool { self.0 == Self::OK.0 }
}

impl From<u32> for CommandStatus {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "0x{:08X}", self.0) }
}

/// A short message received from the SMSC.
///
/// `text` has already been decoded using the message's data coding and, for
/// concatenated parts, no longer contains the user data header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Originating address.
    pub source: String,
    /// Destination address.
    pub destination: String,
    /// Decoded text of this part.
    pub text: String,
    /// Concatenation header when the message is one part of a longer one.
    pub concat: Option<ConcatHeader>,
    /// Whether the SMSC flagged the message as a delivery receipt.
    pub is_receipt: bool,
}

impl InboundMessage {
    /// Create a single-part message with no concatenation header.
    #[must_use]
    pub fn single(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: String::new(),
            text: text.into(),
            concat: None,
            is_receipt: false,
        }
    }

    /// Create one part of a concatenated message.
    #[must_use]
    pub fn part(source: impl Into<String>, text: impl Into<String>, concat: ConcatHeader) -> Self {
        Self {
            concat: Some(concat),
            ..Self::single(source, text)
        }
    }
}

/// Asynchronous notifications produced by a bound session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Response to an earlier submission. Frees one outstanding slot.
    SubmitAck {
        /// Sequence number of the acknowledged request.
        sequence: u32,
        /// Status reported by the SMSC.
        status: CommandStatus,
        /// Identifier assigned by the SMSC on success.
        message_id: Option<String>,
    },
    /// A submission that will never be answered because its session's
    /// reader stopped. Frees one outstanding slot.
    SubmitAbandoned {
        /// Sequence number of the abandoned request.
        sequence: u32,
    },
    /// Response to a keep-alive probe.
    KeepAliveAck,
    /// Generic negative acknowledgment of a malformed or unknown request.
    GenericNack {
        /// Sequence number of the rejected request.
        sequence: u32,
        /// Status reported by the SMSC.
        status: CommandStatus,
    },
    /// Unsolicited data notification.
    Data(InboundMessage),
    /// Inbound short message, possibly one part of a concatenated message.
    Deliver(InboundMessage),
}

impl Notification {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubmitAck { .. } => "submit_ack",
            Self::SubmitAbandoned { .. } => "submit_abandoned",
            Self::KeepAliveAck => "keep_alive_ack",
            Self::GenericNack { .. } => "generic_nack",
            Self::Data(_) => "data",
            Self::Deliver(_) => "deliver",
        }
    }
}
