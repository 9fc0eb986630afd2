//! Session capability consumed by the pool.
//!
//! A [`Session`] is one bound protocol connection. The pool only needs to
//! submit requests through it, ask whether it is still alive and close it;
//! everything else (bind, keep-alive, wire encoding) stays behind the trait.
//! Inbound traffic is reported through a [`NotificationHandler`] that the
//! [`SessionConnector`] installs when the session is created.

mod notification;
mod registry;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use notification::{CommandStatus, InboundMessage, Notification};
pub use registry::SessionRegistry;

use crate::{message::OutboundMessage, smpp::TransportError};

/// Stable identifier assigned to a session when its pool slot is created.
///
/// Per-session accounting keys on this value rather than on object identity.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SessionId(u64);

impl From<u64> for SessionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl SessionId {
    /// Create a new [`SessionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "session-{}", self.0) }
}

/// Callback invoked by a session for every inbound notification.
///
/// Sessions call it from their own reader task, so implementations must be
/// cheap and must not block.
pub type NotificationHandler = Arc<dyn Fn(SessionId, Notification) + Send + Sync + 'static>;

/// One bound protocol connection.
///
/// Implementations must tolerate `close` being called more than once and
/// concurrently with an in-flight `submit`; the submit may then fail with a
/// transport error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Identifier used for per-session accounting.
    fn id(&self) -> SessionId;

    /// Send one outbound message.
    ///
    /// Returns once the request has been written. The acknowledgment arrives
    /// later as [`Notification::SubmitAck`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request cannot be written.
    async fn submit(&self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Tear the session down. Idempotent.
    async fn close(&self);

    /// Whether the session still believes its connection is usable.
    fn is_alive(&self) -> bool;
}

/// Factory producing bound sessions for pool slots.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: Session;

    /// Open and bind a session, routing its inbound notifications to
    /// `on_notification`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection or bind fails.
    async fn connect(
        &self,
        id: SessionId,
        on_notification: NotificationHandler,
    ) -> Result<Self::Session, TransportError>;
}
