//! SMPP v3.4 protocol data units used by the client.
//!
//! Only the operations a transceiver client needs are modelled. Frames
//! handled here start at `command_id`; the 4-octet length prefix belongs to
//! the codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::PduError;
use crate::{message::OutboundMessage, session::CommandStatus};

/// Command identifiers.
pub mod command {
    pub const GENERIC_NACK: u32 = 0x8000_0000;
    pub const BIND_TRANSCEIVER: u32 = 0x0000_0009;
    pub const BIND_TRANSCEIVER_RESP: u32 = 0x8000_0009;
    pub const SUBMIT_SM: u32 = 0x0000_0004;
    pub const SUBMIT_SM_RESP: u32 = 0x8000_0004;
    pub const DELIVER_SM: u32 = 0x0000_0005;
    pub const DELIVER_SM_RESP: u32 = 0x8000_0005;
    pub const UNBIND: u32 = 0x0000_0006;
    pub const UNBIND_RESP: u32 = 0x8000_0006;
    pub const ENQUIRE_LINK: u32 = 0x0000_0015;
    pub const ENQUIRE_LINK_RESP: u32 = 0x8000_0015;
    pub const DATA_SM: u32 = 0x0000_0103;
    pub const DATA_SM_RESP: u32 = 0x8000_0103;
}

/// Octets in the header after the length prefix.
pub const HEADER_LEN: usize = 12;
/// Interface version announced when binding.
pub const INTERFACE_VERSION: u8 = 0x34;
/// TLV tag carrying a `data_sm` payload.
pub const TAG_MESSAGE_PAYLOAD: u16 = 0x0424;

const SERVICE_TYPE_MAX: usize = 6;
const SYSTEM_ID_MAX: usize = 16;
const PASSWORD_MAX: usize = 9;
const SYSTEM_TYPE_MAX: usize = 13;
const ADDRESS_RANGE_MAX: usize = 41;
const ADDR_MAX: usize = 21;
const TIME_MAX: usize = 17;
const MESSAGE_ID_MAX: usize = 65;
const SHORT_MESSAGE_MAX: usize = 254;

/// Address triple as it appears on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PduAddress {
    pub ton: u8,
    pub npi: u8,
    pub addr: String,
}

/// Optional tag-length-value parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Bytes,
}

/// Body of `bind_transceiver`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindTransceiver {
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub address_range: PduAddress,
}

/// Body shared by `submit_sm` and `deliver_sm`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShortMessage {
    pub service_type: String,
    pub source: PduAddress,
    pub destination: PduAddress,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl ShortMessage {
    /// Message octets, taken from `message_payload` when `short_message` is
    /// empty.
    #[must_use]
    pub fn body(&self) -> Bytes {
        if !self.short_message.is_empty() {
            return self.short_message.clone();
        }
        find_payload(&self.tlvs)
    }
}

impl From<&OutboundMessage> for ShortMessage {
    fn from(message: &OutboundMessage) -> Self {
        Self {
            source: PduAddress {
                ton: message.source().ton(),
                npi: message.source().npi(),
                addr: message.source().value().to_owned(),
            },
            destination: PduAddress {
                ton: message.destination().ton(),
                npi: message.destination().npi(),
                addr: message.destination().value().to_owned(),
            },
            esm_class: message.esm_class(),
            protocol_id: message.protocol_id(),
            registered_delivery: message.registered_delivery(),
            replace_if_present: message.replace_if_present(),
            data_coding: message.data_coding().code(),
            short_message: message.payload().clone(),
            ..Self::default()
        }
    }
}

/// Body of `data_sm`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSm {
    pub service_type: String,
    pub source: PduAddress,
    pub destination: PduAddress,
    pub esm_class: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
    pub tlvs: Vec<Tlv>,
}

impl DataSm {
    /// Payload carried in the `message_payload` TLV, if any.
    #[must_use]
    pub fn payload(&self) -> Bytes { find_payload(&self.tlvs) }
}

fn find_payload(tlvs: &[Tlv]) -> Bytes {
    tlvs.iter()
        .find(|tlv| tlv.tag == TAG_MESSAGE_PAYLOAD)
        .map(|tlv| tlv.value.clone())
        .unwrap_or_default()
}

/// Operation-specific part of a PDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PduBody {
    BindTransceiver(BindTransceiver),
    BindTransceiverResp { system_id: String },
    SubmitSm(ShortMessage),
    SubmitSmResp { message_id: String },
    DeliverSm(ShortMessage),
    DeliverSmResp,
    DataSm(DataSm),
    DataSmResp { message_id: String },
    EnquireLink,
    EnquireLinkResp,
    Unbind,
    UnbindResp,
    GenericNack,
    /// A command this client does not model.
    Unknown { command_id: u32, body: Bytes },
    /// A known command whose body failed to decode.
    Invalid { command_id: u32, error: PduError },
}

impl PduBody {
    /// Wire command identifier.
    #[must_use]
    pub const fn command_id(&self) -> u32 {
        match self {
            Self::BindTransceiver(_) => command::BIND_TRANSCEIVER,
            Self::BindTransceiverResp { .. } => command::BIND_TRANSCEIVER_RESP,
            Self::SubmitSm(_) => command::SUBMIT_SM,
            Self::SubmitSmResp { .. } => command::SUBMIT_SM_RESP,
            Self::DeliverSm(_) => command::DELIVER_SM,
            Self::DeliverSmResp => command::DELIVER_SM_RESP,
            Self::DataSm(_) => command::DATA_SM,
            Self::DataSmResp { .. } => command::DATA_SM_RESP,
            Self::EnquireLink => command::ENQUIRE_LINK,
            Self::EnquireLinkResp => command::ENQUIRE_LINK_RESP,
            Self::Unbind => command::UNBIND,
            Self::UnbindResp => command::UNBIND_RESP,
            Self::GenericNack => command::GENERIC_NACK,
            Self::Unknown { command_id, .. } | Self::Invalid { command_id, .. } => *command_id,
        }
    }

    /// Operation name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BindTransceiver(_) => "bind_transceiver",
            Self::BindTransceiverResp { .. } => "bind_transceiver_resp",
            Self::SubmitSm(_) => "submit_sm",
            Self::SubmitSmResp { .. } => "submit_sm_resp",
            Self::DeliverSm(_) => "deliver_sm",
            Self::DeliverSmResp => "deliver_sm_resp",
            Self::DataSm(_) => "data_sm",
            Self::DataSmResp { .. } => "data_sm_resp",
            Self::EnquireLink => "enquire_link",
            Self::EnquireLinkResp => "enquire_link_resp",
            Self::Unbind => "unbind",
            Self::UnbindResp => "unbind_resp",
            Self::GenericNack => "generic_nack",
            Self::Unknown { .. } => "unknown",
            Self::Invalid { .. } => "invalid",
        }
    }
}

/// A decoded protocol data unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    pub status: CommandStatus,
    pub sequence: u32,
    pub body: PduBody,
}

impl Pdu {
    /// Build a request PDU.
    #[must_use]
    pub const fn request(sequence: u32, body: PduBody) -> Self {
        Self {
            status: CommandStatus::OK,
            sequence,
            body,
        }
    }

    /// Build a response PDU echoing `sequence`.
    #[must_use]
    pub const fn response(sequence: u32, status: CommandStatus, body: PduBody) -> Self {
        Self {
            status,
            sequence,
            body,
        }
    }

    /// Encode the PDU, starting at `command_id`, into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`PduError::FieldTooLong`] if a field exceeds its width.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), PduError> {
        dst.put_u32(self.body.command_id());
        dst.put_u32(self.status.0);
        dst.put_u32(self.sequence);
        match &self.body {
            PduBody::BindTransceiver(bind) => {
                put_cstring(dst, &bind.system_id, SYSTEM_ID_MAX, "system_id")?;
                put_cstring(dst, &bind.password, PASSWORD_MAX, "password")?;
                put_cstring(dst, &bind.system_type, SYSTEM_TYPE_MAX, "system_type")?;
                dst.put_u8(bind.interface_version);
                dst.put_u8(bind.address_range.ton);
                dst.put_u8(bind.address_range.npi);
                put_cstring(
                    dst,
                    &bind.address_range.addr,
                    ADDRESS_RANGE_MAX,
                    "address_range",
                )?;
            }
            PduBody::BindTransceiverResp { system_id } => {
                put_cstring(dst, system_id, SYSTEM_ID_MAX, "system_id")?;
            }
            PduBody::SubmitSm(sm) | PduBody::DeliverSm(sm) => encode_short_message(dst, sm)?,
            PduBody::SubmitSmResp { message_id } | PduBody::DataSmResp { message_id } => {
                put_cstring(dst, message_id, MESSAGE_ID_MAX, "message_id")?;
            }
            PduBody::DeliverSmResp => dst.put_u8(0),
            PduBody::DataSm(data) => {
                put_cstring(dst, &data.service_type, SERVICE_TYPE_MAX, "service_type")?;
                put_address(dst, &data.source, "source_addr")?;
                put_address(dst, &data.destination, "destination_addr")?;
                dst.put_u8(data.esm_class);
                dst.put_u8(data.registered_delivery);
                dst.put_u8(data.data_coding);
                put_tlvs(dst, &data.tlvs)?;
            }
            PduBody::Unknown { body, .. } => dst.put_slice(body),
            PduBody::EnquireLink
            | PduBody::EnquireLinkResp
            | PduBody::Unbind
            | PduBody::UnbindResp
            | PduBody::GenericNack
            | PduBody::Invalid { .. } => {}
        }
        Ok(())
    }

    /// Decode a frame that starts at `command_id`.
    ///
    /// A malformed body does not fail the call: it decodes to
    /// [`PduBody::Invalid`] so the caller can still answer the sequence
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`PduError::Truncated`] if the frame is shorter than the
    /// header.
    pub fn decode(mut frame: Bytes) -> Result<Self, PduError> {
        if frame.len() < HEADER_LEN {
            return Err(PduError::Truncated { field: "header" });
        }
        let command_id = frame.get_u32();
        let status = CommandStatus(frame.get_u32());
        let sequence = frame.get_u32();
        let body = decode_body(command_id, frame)
            .unwrap_or_else(|error| PduBody::Invalid { command_id, error });
        Ok(Self {
            status,
            sequence,
            body,
        })
    }
}

fn decode_body(command_id: u32, mut buf: Bytes) -> Result<PduBody, PduError> {
    let body = match command_id {
        command::BIND_TRANSCEIVER => PduBody::BindTransceiver(BindTransceiver {
            system_id: get_cstring(&mut buf, SYSTEM_ID_MAX, "system_id")?,
            password: get_cstring(&mut buf, PASSWORD_MAX, "password")?,
            system_type: get_cstring(&mut buf, SYSTEM_TYPE_MAX, "system_type")?,
            interface_version: get_u8(&mut buf, "interface_version")?,
            address_range: PduAddress {
                ton: get_u8(&mut buf, "addr_ton")?,
                npi: get_u8(&mut buf, "addr_npi")?,
                addr: get_cstring(&mut buf, ADDRESS_RANGE_MAX, "address_range")?,
            },
        }),
        command::BIND_TRANSCEIVER_RESP => PduBody::BindTransceiverResp {
            system_id: get_optional_cstring(&mut buf, SYSTEM_ID_MAX, "system_id")?,
        },
        command::SUBMIT_SM => PduBody::SubmitSm(decode_short_message(&mut buf)?),
        command::DELIVER_SM => PduBody::DeliverSm(decode_short_message(&mut buf)?),
        command::SUBMIT_SM_RESP => PduBody::SubmitSmResp {
            message_id: get_optional_cstring(&mut buf, MESSAGE_ID_MAX, "message_id")?,
        },
        command::DATA_SM_RESP => PduBody::DataSmResp {
            message_id: get_optional_cstring(&mut buf, MESSAGE_ID_MAX, "message_id")?,
        },
        command::DELIVER_SM_RESP => PduBody::DeliverSmResp,
        command::DATA_SM => PduBody::DataSm(DataSm {
            service_type: get_cstring(&mut buf, SERVICE_TYPE_MAX, "service_type")?,
            source: get_address(&mut buf, "source_addr")?,
            destination: get_address(&mut buf, "destination_addr")?,
            esm_class: get_u8(&mut buf, "esm_class")?,
            registered_delivery: get_u8(&mut buf, "registered_delivery")?,
            data_coding: get_u8(&mut buf, "data_coding")?,
            tlvs: get_tlvs(&mut buf)?,
        }),
        command::ENQUIRE_LINK => PduBody::EnquireLink,
        command::ENQUIRE_LINK_RESP => PduBody::EnquireLinkResp,
        command::UNBIND => PduBody::Unbind,
        command::UNBIND_RESP => PduBody::UnbindResp,
        command::GENERIC_NACK => PduBody::GenericNack,
        _ => PduBody::Unknown {
            command_id,
            body: buf,
        },
    };
    Ok(body)
}

fn encode_short_message(dst: &mut BytesMut, sm: &ShortMessage) -> Result<(), PduError> {
    put_cstring(dst, &sm.service_type, SERVICE_TYPE_MAX, "service_type")?;
    put_address(dst, &sm.source, "source_addr")?;
    put_address(dst, &sm.destination, "destination_addr")?;
    dst.put_u8(sm.esm_class);
    dst.put_u8(sm.protocol_id);
    dst.put_u8(sm.priority_flag);
    put_cstring(
        dst,
        &sm.schedule_delivery_time,
        TIME_MAX,
        "schedule_delivery_time",
    )?;
    put_cstring(dst, &sm.validity_period, TIME_MAX, "validity_period")?;
    dst.put_u8(sm.registered_delivery);
    dst.put_u8(sm.replace_if_present);
    dst.put_u8(sm.data_coding);
    dst.put_u8(sm.sm_default_msg_id);
    let len = u8::try_from(sm.short_message.len())
        .ok()
        .filter(|len| usize::from(*len) <= SHORT_MESSAGE_MAX)
        .ok_or(PduError::FieldTooLong {
            field: "short_message",
            len: sm.short_message.len(),
            max: SHORT_MESSAGE_MAX,
        })?;
    dst.put_u8(len);
    dst.put_slice(&sm.short_message);
    put_tlvs(dst, &sm.tlvs)
}

fn decode_short_message(buf: &mut Bytes) -> Result<ShortMessage, PduError> {
    let service_type = get_cstring(buf, SERVICE_TYPE_MAX, "service_type")?;
    let source = get_address(buf, "source_addr")?;
    let destination = get_address(buf, "destination_addr")?;
    let esm_class = get_u8(buf, "esm_class")?;
    let protocol_id = get_u8(buf, "protocol_id")?;
    let priority_flag = get_u8(buf, "priority_flag")?;
    let schedule_delivery_time = get_cstring(buf, TIME_MAX, "schedule_delivery_time")?;
    let validity_period = get_cstring(buf, TIME_MAX, "validity_period")?;
    let registered_delivery = get_u8(buf, "registered_delivery")?;
    let replace_if_present = get_u8(buf, "replace_if_present_flag")?;
    let data_coding = get_u8(buf, "data_coding")?;
    let sm_default_msg_id = get_u8(buf, "sm_default_msg_id")?;
    let sm_length = usize::from(get_u8(buf, "sm_length")?);
    if buf.remaining() < sm_length {
        return Err(PduError::Truncated {
            field: "short_message",
        });
    }
    let short_message = buf.split_to(sm_length);
    Ok(ShortMessage {
        service_type,
        source,
        destination,
        esm_class,
        protocol_id,
        priority_flag,
        schedule_delivery_time,
        validity_period,
        registered_delivery,
        replace_if_present,
        data_coding,
        sm_default_msg_id,
        short_message,
        tlvs: get_tlvs(buf)?,
    })
}

fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, PduError> {
    if buf.has_remaining() {
        Ok(buf.get_u8())
    } else {
        Err(PduError::Truncated { field })
    }
}

fn get_cstring(buf: &mut Bytes, max: usize, field: &'static str) -> Result<String, PduError> {
    let window = &buf[..buf.len().min(max)];
    let Some(end) = window.iter().position(|&b| b == 0) else {
        return Err(if buf.len() < max {
            PduError::Truncated { field }
        } else {
            PduError::Unterminated { field, max }
        });
    };
    let value = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.advance(end + 1);
    Ok(value)
}

/// Response bodies are omitted when the status is an error.
fn get_optional_cstring(
    buf: &mut Bytes,
    max: usize,
    field: &'static str,
) -> Result<String, PduError> {
    if buf.has_remaining() {
        get_cstring(buf, max, field)
    } else {
        Ok(String::new())
    }
}

fn get_address(buf: &mut Bytes, field: &'static str) -> Result<PduAddress, PduError> {
    Ok(PduAddress {
        ton: get_u8(buf, field)?,
        npi: get_u8(buf, field)?,
        addr: get_cstring(buf, ADDR_MAX, field)?,
    })
}

fn get_tlvs(buf: &mut Bytes) -> Result<Vec<Tlv>, PduError> {
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < 4 {
            return Err(PduError::Truncated { field: "tlv header" });
        }
        let tag = buf.get_u16();
        let len = usize::from(buf.get_u16());
        if buf.remaining() < len {
            return Err(PduError::Truncated { field: "tlv value" });
        }
        tlvs.push(Tlv {
            tag,
            value: buf.split_to(len),
        });
    }
    Ok(tlvs)
}

fn put_cstring(
    dst: &mut BytesMut,
    value: &str,
    max: usize,
    field: &'static str,
) -> Result<(), PduError> {
    if value.len() >= max {
        return Err(PduError::FieldTooLong {
            field,
            len: value.len(),
            max: max - 1,
        });
    }
    dst.put_slice(value.as_bytes());
    dst.put_u8(0);
    Ok(())
}

fn put_address(dst: &mut BytesMut, address: &PduAddress, field: &'static str) -> Result<(), PduError> {
    dst.put_u8(address.ton);
    dst.put_u8(address.npi);
    put_cstring(dst, &address.addr, ADDR_MAX, field)
}

fn put_tlvs(dst: &mut BytesMut, tlvs: &[Tlv]) -> Result<(), PduError> {
    for tlv in tlvs {
        let len = u16::try_from(tlv.value.len()).map_err(|_| PduError::FieldTooLong {
            field: "tlv value",
            len: tlv.value.len(),
            max: usize::from(u16::MAX),
        })?;
        dst.put_u16(tlv.tag);
        dst.put_u16(len);
        dst.put_slice(&tlv.value);
    }
    Ok(())
}
