//! Outbound message construction.
//!
//! [`MessageTemplate`] carries the fixed addressing and delivery options used
//! for every submission and turns plain text into an [`OutboundMessage`]. It
//! is stateless; the same template is shared by every submitting task.

mod coding;
mod error;

use bytes::Bytes;
pub use coding::DataCoding;
pub use error::MessageError;
use static_assertions::const_assert;

/// Largest encoded short message body accepted for submission.
pub const MAX_SHORT_MESSAGE_LEN: usize = 254;
/// Largest address accepted in the source and destination fields.
pub const MAX_ADDRESS_LEN: usize = 20;

// The body length travels in a one-octet field.
const_assert!(MAX_SHORT_MESSAGE_LEN <= u8::MAX as usize);

/// Typed address: type of number, numbering plan and digits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    ton: u8,
    npi: u8,
    value: String,
}

impl Address {
    /// Build an address, rejecting values wider than the protocol field.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::AddressTooLong`] if `value` exceeds
    /// [`MAX_ADDRESS_LEN`] bytes.
    pub fn new(ton: u8, npi: u8, value: impl Into<String>) -> Result<Self, MessageError> {
        let value = value.into();
        if value.len() > MAX_ADDRESS_LEN {
            return Err(MessageError::AddressTooLong {
                address: value,
                max: MAX_ADDRESS_LEN,
            });
        }
        Ok(Self { ton, npi, value })
    }

    /// Type of number.
    #[must_use]
    pub const fn ton(&self) -> u8 { self.ton }

    /// Numbering plan indicator.
    #[must_use]
    pub const fn npi(&self) -> u8 { self.npi }

    /// Address digits.
    #[must_use]
    pub fn value(&self) -> &str { &self.value }
}

/// How the template chooses a data coding for each message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingPolicy {
    /// Always use the given coding.
    Fixed(DataCoding),
    /// Use the narrowest coding able to carry the text.
    Narrowest,
}

impl Default for EncodingPolicy {
    fn default() -> Self { Self::Fixed(DataCoding::Ucs2) }
}

impl EncodingPolicy {
    /// Resolve the coding for `text`.
    #[must_use]
    pub fn select(self, text: &str) -> DataCoding {
        match self {
            Self::Fixed(coding) => coding,
            Self::Narrowest => DataCoding::narrowest(text),
        }
    }
}

/// A fully built short message ready for submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    text: String,
    source: Address,
    destination: Address,
    data_coding: DataCoding,
    payload: Bytes,
    esm_class: u8,
    protocol_id: u8,
    registered_delivery: u8,
    replace_if_present: u8,
}

impl OutboundMessage {
    /// Original text, kept for diagnostics.
    #[must_use]
    pub fn text(&self) -> &str { &self.text }

    /// Source address.
    #[must_use]
    pub const fn source(&self) -> &Address { &self.source }

    /// Destination address.
    #[must_use]
    pub const fn destination(&self) -> &Address { &self.destination }

    /// Coding used for the payload.
    #[must_use]
    pub const fn data_coding(&self) -> DataCoding { self.data_coding }

    /// Encoded body octets.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// ESM class flags.
    #[must_use]
    pub const fn esm_class(&self) -> u8 { self.esm_class }

    /// Protocol identifier.
    #[must_use]
    pub const fn protocol_id(&self) -> u8 { self.protocol_id }

    /// Delivery receipt request flags.
    #[must_use]
    pub const fn registered_delivery(&self) -> u8 { self.registered_delivery }

    /// Replace-if-present flag.
    #[must_use]
    pub const fn replace_if_present(&self) -> u8 { self.replace_if_present }
}

/// Fixed addressing and options applied to every outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    /// Sender address.
    pub source: Address,
    /// Recipient address.
    pub destination: Address,
    /// Coding selection rule.
    pub encoding: EncodingPolicy,
    /// Delivery receipt request flags.
    pub registered_delivery: u8,
    /// Protocol identifier.
    pub protocol_id: u8,
    /// ESM class flags.
    pub esm_class: u8,
    /// Replace-if-present flag.
    pub replace_if_present: u8,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            source: Address {
                ton: 5,
                npi: 0,
                value: "00522241".to_owned(),
            },
            destination: Address {
                ton: 1,
                npi: 1,
                value: "99522241".to_owned(),
            },
            encoding: EncodingPolicy::default(),
            registered_delivery: 1,
            protocol_id: 0,
            esm_class: 0,
            replace_if_present: 0,
        }
    }
}

impl MessageTemplate {
    /// Replace the coding selection rule.
    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingPolicy) -> Self {
        self.encoding = encoding;
        self
    }

    /// Build an outbound message carrying `text`.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] if the text cannot be encoded with the
    /// selected coding or the encoded body exceeds [`MAX_SHORT_MESSAGE_LEN`].
    ///
    /// # Examples
    ///
    /// ```
    /// use smpp_pool::message::{DataCoding, MessageTemplate};
    ///
    /// let message = MessageTemplate::default().build("MSG 1").expect("encodable");
    /// assert_eq!(message.data_coding(), DataCoding::Ucs2);
    /// assert_eq!(message.payload().len(), 10);
    /// assert_eq!(message.destination().value(), "99522241");
    /// ```
    pub fn build(&self, text: &str) -> Result<OutboundMessage, MessageError> {
        let data_coding = self.encoding.select(text);
        let payload = data_coding.encode(text)?;
        if payload.len() > MAX_SHORT_MESSAGE_LEN {
            return Err(MessageError::TooLong {
                len: payload.len(),
                max: MAX_SHORT_MESSAGE_LEN,
            });
        }
        Ok(OutboundMessage {
            text: text.to_owned(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            data_coding,
            payload: Bytes::from(payload),
            esm_class: self.esm_class,
            protocol_id: self.protocol_id,
            registered_delivery: self.registered_delivery,
            replace_if_present: self.replace_if_present,
        })
    }
}

#[cfg(test)]
mod tests;
