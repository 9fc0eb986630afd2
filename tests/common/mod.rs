//! Shared utilities for integration tests.
//!
//! Provides an in-memory [`StubSession`] and [`StubConnector`] that record
//! submissions and let a test inject inbound notifications, plus small
//! builders for windows and messages.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use smpp_pool::{
    message::{MessageTemplate, OutboundMessage},
    pool::SubmitWindow,
    session::{
        CommandStatus,
        InboundMessage,
        Notification,
        NotificationHandler,
        Session,
        SessionConnector,
        SessionId,
    },
    smpp::TransportError,
};

/// Non-zero helper for limits in tests.
pub fn non_zero(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).expect("non-zero") }

/// Shared submit window with the given capacity.
pub fn window(max_outstanding: usize) -> Arc<SubmitWindow> {
    Arc::new(SubmitWindow::new(non_zero(max_outstanding)))
}

/// Message built with the default template.
pub fn message(text: &str) -> OutboundMessage {
    MessageTemplate::default()
        .build(text)
        .expect("ASCII text encodes")
}

/// Observable state behind a [`StubSession`].
pub struct StubState {
    id: SessionId,
    on_notification: NotificationHandler,
    submitted: Mutex<Vec<String>>,
    fail_submits: AtomicBool,
    auto_ack: bool,
    closed: AtomicBool,
}

impl fmt::Debug for StubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubState")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl StubState {
    /// Identifier of the session.
    pub fn id(&self) -> SessionId { self.id }

    /// Texts submitted so far.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Make every later submit fail.
    pub fn fail_submits(&self) { self.fail_submits.store(true, Ordering::SeqCst); }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    /// Deliver a successful submit acknowledgment.
    pub fn ack(&self) {
        (self.on_notification)(
            self.id,
            Notification::SubmitAck {
                sequence: 1,
                status: CommandStatus::OK,
                message_id: Some("stub".into()),
            },
        );
    }

    /// Deliver an inbound short message.
    pub fn deliver(&self, message: InboundMessage) {
        (self.on_notification)(self.id, Notification::Deliver(message));
    }
}

/// In-memory session that records what it is asked to send.
#[derive(Debug)]
pub struct StubSession(Arc<StubState>);

impl StubSession {
    /// Session whose notifications are discarded.
    pub fn detached(id: u64) -> Self {
        Self::new(
            SessionId::new(id),
            Arc::new(|_: SessionId, _: Notification| {}),
            false,
        )
    }

    fn new(id: SessionId, on_notification: NotificationHandler, auto_ack: bool) -> Self {
        Self(Arc::new(StubState {
            id,
            on_notification,
            submitted: Mutex::new(Vec::new()),
            fail_submits: AtomicBool::new(false),
            auto_ack,
            closed: AtomicBool::new(false),
        }))
    }

    /// Shared state for assertions.
    pub fn state(&self) -> Arc<StubState> { Arc::clone(&self.0) }
}

#[async_trait]
impl Session for StubSession {
    fn id(&self) -> SessionId { self.0.id }

    async fn submit(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.0.is_closed() || self.0.fail_submits.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.0
            .submitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.text().to_owned());
        if self.0.auto_ack {
            // On a current-thread runtime this runs after the caller commits
            // its window slot.
            let state = Arc::clone(&self.0);
            tokio::spawn(async move { state.ack() });
        }
        Ok(())
    }

    async fn close(&self) { self.0.closed.store(true, Ordering::SeqCst); }

    fn is_alive(&self) -> bool { !self.0.is_closed() }
}

/// Connector producing [`StubSession`]s and remembering their state.
#[derive(Debug, Default)]
pub struct StubConnector {
    sessions: Mutex<Vec<Arc<StubState>>>,
    fail_on: Option<SessionId>,
    auto_ack: bool,
}

impl StubConnector {
    /// Connector whose sessions acknowledge every submission.
    pub fn auto_ack() -> Self {
        Self {
            auto_ack: true,
            ..Self::default()
        }
    }

    /// Connector that fails to bind session `id`.
    pub fn failing_on(id: u64) -> Self {
        Self {
            fail_on: Some(SessionId::new(id)),
            ..Self::default()
        }
    }

    /// State of every session bound so far, in id order.
    pub fn sessions(&self) -> Vec<Arc<StubState>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        sessions.sort_by_key(|state| state.id);
        sessions
    }
}

#[async_trait]
impl SessionConnector for StubConnector {
    type Session = StubSession;

    async fn connect(
        &self,
        id: SessionId,
        on_notification: NotificationHandler,
    ) -> Result<Self::Session, TransportError> {
        if self.fail_on == Some(id) {
            return Err(TransportError::Closed);
        }
        let session = StubSession::new(id, on_notification, self.auto_ack);
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(session.state());
        Ok(session)
    }
}
