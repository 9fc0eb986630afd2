//! Routing of inbound notifications.
//!
//! [`InboundDispatcher`] is installed as every session's
//! [`NotificationHandler`]. Acknowledgments and abandoned submissions
//! release a slot in the shared [`SubmitWindow`]; deliveries are passed to
//! the completed-message callback directly, or through a
//! [`ReassemblyTable`] when they carry a concatenation header.
//! Concatenation references are only unique within one bind, so every
//! session gets its own table. Other notifications are only logged.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, info, warn};

use crate::{
    metrics::{self, AckOutcome},
    pool::SubmitWindow,
    reassembly::{ReassemblyPolicy, ReassemblyTable},
    session::{InboundMessage, Notification, NotificationHandler, SessionId},
};

/// A fully received inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedMessage {
    /// Session the final part arrived on.
    pub session: SessionId,
    /// Originating address.
    pub source: String,
    /// Joined text of every part.
    pub text: String,
    /// Whether the message is a delivery receipt.
    pub is_receipt: bool,
}

/// Callback receiving completed inbound messages.
pub type MessageCallback = Arc<dyn Fn(CompletedMessage) + Send + Sync + 'static>;

/// Routes notifications from every session in a pool.
pub struct InboundDispatcher {
    window: Arc<SubmitWindow>,
    policy: ReassemblyPolicy,
    tables: Mutex<HashMap<SessionId, ReassemblyTable>>,
    on_message: MessageCallback,
}

impl fmt::Debug for InboundDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundDispatcher")
            .field("window", &self.window)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl InboundDispatcher {
    /// Create a dispatcher feeding `window` and `on_message`.
    #[must_use]
    pub fn new(
        window: Arc<SubmitWindow>,
        policy: ReassemblyPolicy,
        on_message: MessageCallback,
    ) -> Self {
        Self {
            window,
            policy,
            tables: Mutex::new(HashMap::new()),
            on_message,
        }
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<SessionId, ReassemblyTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one notification from `session`.
    pub fn handle(&self, session: SessionId, notification: Notification) {
        match notification {
            Notification::SubmitAck {
                sequence,
                status,
                message_id,
            } => {
                let outcome = if status.is_ok() {
                    debug!("{session}: submit {sequence} accepted as {message_id:?}");
                    AckOutcome::Accepted
                } else {
                    warn!("{session}: submit {sequence} rejected with status {status}");
                    AckOutcome::Rejected
                };
                metrics::inc_acks(outcome);
                self.window.acknowledge();
            }
            Notification::SubmitAbandoned { sequence } => {
                warn!("{session}: submit {sequence} abandoned without a response");
                metrics::inc_acks(AckOutcome::Abandoned);
                self.window.acknowledge();
            }
            Notification::KeepAliveAck => debug!("{session}: keep-alive acknowledged"),
            Notification::GenericNack { sequence, status } => {
                warn!("{session}: generic_nack for sequence {sequence} with status {status}");
            }
            Notification::Data(message) => {
                info!(
                    "{session}: data notification from {} ({} chars)",
                    message.source,
                    message.text.chars().count()
                );
            }
            Notification::Deliver(message) => self.deliver(session, message),
        }
    }

    fn deliver(&self, session: SessionId, message: InboundMessage) {
        let InboundMessage {
            source,
            text,
            concat,
            is_receipt,
            ..
        } = message;
        let text = match concat {
            None => text,
            Some(header) => {
                let accepted = self
                    .tables()
                    .entry(session)
                    .or_insert_with(|| ReassemblyTable::new(self.policy))
                    .accept(header, text);
                match accepted {
                    Ok(Some(joined)) => joined,
                    Ok(None) => return,
                    Err(e) => {
                        metrics::inc_dropped_parts();
                        warn!("{session}: dropping part from {source}: {e}");
                        return;
                    }
                }
            }
        };
        info!("{session}: message from {source} complete ({} chars)", text.chars().count());
        metrics::inc_inbound_messages();
        (self.on_message)(CompletedMessage {
            session,
            source,
            text,
            is_receipt,
        });
    }

    /// Discard partial messages older than the reassembly TTL.
    ///
    /// Returns the number of references removed across all sessions.
    pub fn purge_expired(&self) -> usize {
        self.tables()
            .values_mut()
            .map(|table| table.purge_expired().len())
            .sum()
    }

    /// Number of partially received messages across all sessions.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tables().values().map(ReassemblyTable::pending_count).sum()
    }

    /// Wrap the dispatcher as a session notification handler.
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> NotificationHandler {
        let dispatcher = Arc::clone(self);
        Arc::new(move |session, notification| dispatcher.handle(session, notification))
    }
}
