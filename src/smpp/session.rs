//! TCP-backed SMPP transceiver session.
//!
//! [`TcpSession::connect`] opens the socket, binds as a transceiver and then
//! spawns two tasks on a [`TaskTracker`]:
//!
//! - a reader that answers SMSC requests and turns responses and deliveries
//!   into [`Notification`]s;
//! - a keep-alive loop that sends `enquire_link` on a fixed period.
//!
//! Writes from `submit`, the reader and the keep-alive loop share one sink
//! behind an async mutex. The session is marked dead as soon as either task
//! stops or a write fails; it is never reconnected.
//!
//! Sequence numbers of `submit_sm` requests still waiting for an answer are
//! tracked. A `generic_nack` for one of them is reported as a rejected
//! [`Notification::SubmitAck`], and when the reader stops every request
//! still pending is reported as [`Notification::SubmitAbandoned`], so the
//! pool's window never keeps slots for answers that cannot arrive.

use std::{
    collections::HashSet,
    mem,
    sync::{
        Arc,
        Mutex as SyncMutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    net::TcpStream,
    select,
    sync::Mutex,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_util::{codec::Framed, sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, trace, warn};

use super::{
    PduCodec,
    PduError,
    TransportError,
    pdu::{BindTransceiver, INTERFACE_VERSION, Pdu, PduAddress, PduBody, ShortMessage},
    udh,
};
use crate::{
    config::SmscConfig,
    message::{DataCoding, OutboundMessage},
    session::{
        CommandStatus,
        InboundMessage,
        Notification,
        NotificationHandler,
        Session,
        SessionConnector,
        SessionId,
    },
};

/// Largest sequence number before wrapping back to 1.
pub const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

type PduSink = SplitSink<Framed<TcpStream, PduCodec>, Pdu>;
type PduStream = SplitStream<Framed<TcpStream, PduCodec>>;

/// Allocates request sequence numbers in `1..=MAX_SEQUENCE`.
#[derive(Debug, Default)]
struct SequenceCounter(AtomicU32);

impl SequenceCounter {
    fn next(&self) -> u32 {
        let step = |last: u32| last % MAX_SEQUENCE + 1;
        match self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(step(last)))
        {
            Ok(last) | Err(last) => step(last),
        }
    }
}

struct Shared {
    id: SessionId,
    writer: Mutex<PduSink>,
    sequence: SequenceCounter,
    alive: AtomicBool,
    shutdown: CancellationToken,
    /// Sequences of `submit_sm` requests awaiting a response. Nothing is
    /// tracked once the reader has drained it.
    pending: SyncMutex<HashSet<u32>>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashSet<u32>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `sequence` unless the reader has already stopped.
    fn track(&self, sequence: u32) -> bool {
        let mut pending = self.pending();
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        pending.insert(sequence);
        true
    }

    fn untrack(&self, sequence: u32) -> bool {
        self.pending().remove(&sequence)
    }

    /// Mark the session dead and hand back every request still tracked.
    fn abandon_pending(&self) -> HashSet<u32> {
        let mut pending = self.pending();
        self.alive.store(false, Ordering::Release);
        mem::take(&mut *pending)
    }

    async fn send(&self, pdu: Pdu) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let result = writer.send(pdu).await;
        if result.is_err() {
            self.alive.store(false, Ordering::Release);
        }
        result
    }

    async fn reply(
        &self,
        sequence: u32,
        status: CommandStatus,
        body: PduBody,
    ) -> Result<(), TransportError> {
        self.send(Pdu::response(sequence, status, body)).await
    }

    /// Handle one inbound PDU. Returns `false` once the peer has unbound.
    async fn on_pdu(
        &self,
        pdu: Pdu,
        notify: &NotificationHandler,
    ) -> Result<bool, TransportError> {
        let Pdu {
            status,
            sequence,
            body,
        } = pdu;
        trace!(session = %self.id, pdu = body.name(), sequence, %status, "inbound PDU");
        match body {
            PduBody::SubmitSmResp { message_id } => {
                if !self.untrack(sequence) {
                    debug!(session = %self.id, sequence, "submit_sm_resp for unknown sequence");
                }
                notify(
                    self.id,
                    Notification::SubmitAck {
                        sequence,
                        status,
                        message_id: (!message_id.is_empty()).then_some(message_id),
                    },
                );
            }
            PduBody::EnquireLinkResp => notify(self.id, Notification::KeepAliveAck),
            PduBody::GenericNack if self.untrack(sequence) => notify(
                self.id,
                Notification::SubmitAck {
                    sequence,
                    status,
                    message_id: None,
                },
            ),
            PduBody::GenericNack => notify(self.id, Notification::GenericNack { sequence, status }),
            PduBody::DeliverSm(sm) => {
                self.reply(sequence, CommandStatus::OK, PduBody::DeliverSmResp)
                    .await?;
                let inbound = decode_inbound(
                    &sm.source,
                    &sm.destination,
                    sm.esm_class,
                    sm.data_coding,
                    &sm.body(),
                );
                self.forward(inbound, notify, Notification::Deliver);
            }
            PduBody::DataSm(data) => {
                self.reply(
                    sequence,
                    CommandStatus::OK,
                    PduBody::DataSmResp {
                        message_id: String::new(),
                    },
                )
                .await?;
                let inbound = decode_inbound(
                    &data.source,
                    &data.destination,
                    data.esm_class,
                    data.data_coding,
                    &data.payload(),
                );
                self.forward(inbound, notify, Notification::Data);
            }
            PduBody::EnquireLink => {
                self.reply(sequence, CommandStatus::OK, PduBody::EnquireLinkResp)
                    .await?;
            }
            PduBody::Unbind => {
                info!(session = %self.id, "SMSC requested unbind");
                self.reply(sequence, CommandStatus::OK, PduBody::UnbindResp)
                    .await?;
                return Ok(false);
            }
            PduBody::UnbindResp => return Ok(false),
            PduBody::Invalid { command_id, error } => {
                warn!(session = %self.id, command_id, sequence, %error, "malformed PDU from SMSC");
                self.reply(
                    sequence,
                    CommandStatus::INVALID_MESSAGE_LENGTH,
                    PduBody::GenericNack,
                )
                .await?;
            }
            body @ (PduBody::Unknown { .. }
            | PduBody::BindTransceiver(_)
            | PduBody::SubmitSm(_)) => {
                warn!(
                    session = %self.id,
                    command_id = body.command_id(),
                    sequence,
                    "unsupported request from SMSC"
                );
                if body.command_id() & 0x8000_0000 == 0 {
                    self.reply(sequence, CommandStatus::INVALID_COMMAND_ID, PduBody::GenericNack)
                        .await?;
                }
            }
            other => debug!(session = %self.id, pdu = other.name(), sequence, "ignoring response"),
        }
        Ok(true)
    }

    fn forward(
        &self,
        inbound: Result<InboundMessage, PduError>,
        notify: &NotificationHandler,
        wrap: fn(InboundMessage) -> Notification,
    ) {
        match inbound {
            Ok(message) => notify(self.id, wrap(message)),
            Err(error) => warn!(session = %self.id, %error, "dropping inbound message"),
        }
    }
}

fn decode_inbound(
    source: &PduAddress,
    destination: &PduAddress,
    esm_class: u8,
    data_coding: u8,
    payload: &[u8],
) -> Result<InboundMessage, PduError> {
    let (concat, text) = udh::split_concat(esm_class, payload)?;
    Ok(InboundMessage {
        source: source.addr.clone(),
        destination: destination.addr.clone(),
        text: DataCoding::decode(data_coding, text),
        concat,
        is_receipt: udh::is_receipt(esm_class),
    })
}

/// A bound transceiver connection to an SMSC.
pub struct TcpSession {
    shared: Arc<Shared>,
    tracker: TaskTracker,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl std::fmt::Debug for TcpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSession")
            .field("id", &self.shared.id)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl TcpSession {
    /// Connect to the SMSC described by `config` and bind as a transceiver.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection cannot be opened, the
    /// bind is rejected, or no response arrives within the bind timeout.
    pub async fn connect(
        id: SessionId,
        config: &SmscConfig,
        on_notification: NotificationHandler,
    ) -> Result<Self, TransportError> {
        let stream = timeout(
            config.bind_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            operation: "connect",
            after: config.bind_timeout,
        })??;
        stream.set_nodelay(true)?;
        let (mut sink, mut stream) = Framed::new(stream, PduCodec::default()).split();

        let sequence = SequenceCounter::default();
        let bind_sequence = sequence.next();
        sink.send(Pdu::request(
            bind_sequence,
            PduBody::BindTransceiver(BindTransceiver {
                system_id: config.system_id.clone(),
                password: config.password.clone(),
                system_type: config.system_type.clone(),
                interface_version: INTERFACE_VERSION,
                address_range: PduAddress::default(),
            }),
        ))
        .await?;
        let smsc_id = timeout(config.bind_timeout, await_bind(&mut stream, bind_sequence))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "bind",
                after: config.bind_timeout,
            })??;
        info!(session = %id, host = %config.host, port = config.port, %smsc_id, "session bound");

        let shared = Arc::new(Shared {
            id,
            writer: Mutex::new(sink),
            sequence,
            alive: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            pending: SyncMutex::new(HashSet::new()),
        });
        let tracker = TaskTracker::new();
        tracker.spawn(read_loop(
            Arc::clone(&shared),
            stream,
            on_notification,
            config.read_timeout,
        ));
        tracker.spawn(keep_alive_loop(Arc::clone(&shared), config.enquire_link));
        tracker.close();

        Ok(Self {
            shared,
            tracker,
            closed: AtomicBool::new(false),
            close_timeout: config.bind_timeout,
        })
    }
}

async fn await_bind(stream: &mut PduStream, sequence: u32) -> Result<String, TransportError> {
    let pdu = stream.next().await.ok_or(TransportError::Closed)??;
    match pdu.body {
        PduBody::BindTransceiverResp { system_id } if pdu.sequence == sequence => {
            if pdu.status.is_ok() {
                Ok(system_id)
            } else {
                Err(TransportError::BindRejected(pdu.status))
            }
        }
        PduBody::GenericNack => Err(TransportError::BindRejected(pdu.status)),
        other => Err(TransportError::UnexpectedPdu(other.name())),
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    mut stream: PduStream,
    notify: NotificationHandler,
    read_timeout: Duration,
) {
    loop {
        let next = select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            next = timeout(read_timeout, stream.next()) => next,
        };
        match next {
            Err(_) => {
                warn!(session = %shared.id, ?read_timeout, "no traffic from SMSC");
                break;
            }
            Ok(None) => {
                info!(session = %shared.id, "SMSC closed the connection");
                break;
            }
            Ok(Some(Err(e))) => {
                error!(session = %shared.id, error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(pdu))) => match shared.on_pdu(pdu, &notify).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!(session = %shared.id, error = %e, "reply failed");
                    break;
                }
            },
        }
    }
    let abandoned = shared.abandon_pending();
    if !abandoned.is_empty() {
        warn!(
            session = %shared.id,
            count = abandoned.len(),
            "abandoning unanswered submissions"
        );
    }
    for sequence in abandoned {
        notify(shared.id, Notification::SubmitAbandoned { sequence });
    }
    debug!(session = %shared.id, "reader stopped");
}

async fn keep_alive_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let sequence = shared.sequence.next();
        if let Err(e) = shared.send(Pdu::request(sequence, PduBody::EnquireLink)).await {
            warn!(session = %shared.id, error = %e, "keep-alive failed");
            break;
        }
        trace!(session = %shared.id, sequence, "enquire_link sent");
    }
}

#[async_trait]
impl Session for TcpSession {
    fn id(&self) -> SessionId { self.shared.id }

    async fn submit(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let sequence = self.shared.sequence.next();
        // Tracked before writing so a fast response always finds it.
        if !self.shared.track(sequence) {
            return Err(TransportError::Closed);
        }
        let sent = self
            .shared
            .send(Pdu::request(
                sequence,
                PduBody::SubmitSm(ShortMessage::from(message)),
            ))
            .await;
        if let Err(e) = sent {
            self.shared.untrack(sequence);
            return Err(e);
        }
        trace!(session = %self.shared.id, sequence, "submit_sm sent");
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.shared.alive.load(Ordering::Acquire) {
            let sequence = self.shared.sequence.next();
            if let Err(e) = self
                .shared
                .send(Pdu::request(sequence, PduBody::Unbind))
                .await
            {
                debug!(session = %self.shared.id, error = %e, "unbind not sent");
            }
        }
        self.shared.shutdown.cancel();
        if timeout(self.close_timeout, self.tracker.wait()).await.is_err() {
            warn!(session = %self.shared.id, "session tasks did not stop in time");
        }
        self.shared.alive.store(false, Ordering::Release);
        // Ignore: the socket may already be gone.
        let _ = self.shared.writer.lock().await.close().await;
        info!(session = %self.shared.id, "session closed");
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.shared.alive.load(Ordering::Acquire)
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) { self.shared.shutdown.cancel(); }
}

/// Connector producing [`TcpSession`]s for one SMSC.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    config: SmscConfig,
}

impl TcpConnector {
    /// Create a connector for the given endpoint and credentials.
    #[must_use]
    pub fn new(config: SmscConfig) -> Self { Self { config } }
}

#[async_trait]
impl SessionConnector for TcpConnector {
    type Session = TcpSession;

    async fn connect(
        &self,
        id: SessionId,
        on_notification: NotificationHandler,
    ) -> Result<Self::Session, TransportError> {
        TcpSession::connect(id, &self.config, on_notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_one_and_wraps() {
        let counter = SequenceCounter::default();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        counter.0.store(MAX_SEQUENCE - 1, Ordering::Release);
        assert_eq!(counter.next(), MAX_SEQUENCE);
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn receipt_with_concat_header_decodes() {
        let source = PduAddress {
            ton: 1,
            npi: 1,
            addr: "4477".into(),
        };
        let payload = [0x05, 0x00, 0x03, 0x09, 0x02, 0x01, b'h', b'i'];
        let message = decode_inbound(&source, &PduAddress::default(), 0x44, 0x00, &payload)
            .expect("valid part");
        assert_eq!(message.source, "4477");
        assert_eq!(message.text, "hi");
        assert!(message.is_receipt);
        let concat = message.concat.expect("concat header");
        assert_eq!((concat.total_parts, concat.sequence), (2, 1));
    }
}
