//! Framing codec for SMPP PDUs.
//!
//! Every PDU starts with a 4-octet big-endian `command_length` that counts
//! itself. Framing is delegated to `tokio_util`'s `LengthDelimitedCodec`
//! with a `-4` length adjustment; [`Pdu`] handles the rest of the header.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::{
    TransportError,
    pdu::{HEADER_LEN, Pdu},
};

/// Default upper bound on a single PDU, prefix included.
pub const DEFAULT_MAX_PDU_LEN: usize = 64 * 1024;

/// Length prefix size.
pub const LENGTH_HEADER_SIZE: usize = 4;

/// Codec turning a byte stream into [`Pdu`] values and back.
#[derive(Debug)]
pub struct PduCodec {
    inner: LengthDelimitedCodec,
}

impl PduCodec {
    /// Construct a codec rejecting frames longer than `max_pdu_len`.
    #[must_use]
    pub fn new(max_pdu_len: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_HEADER_SIZE)
            .length_adjustment(-(LENGTH_HEADER_SIZE as isize))
            .max_frame_length(max_pdu_len.max(HEADER_LEN + LENGTH_HEADER_SIZE))
            .new_codec();
        Self { inner }
    }
}

impl Default for PduCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_PDU_LEN) }
}

impl Decoder for PduCodec {
    type Item = Pdu;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.inner.decode(src)? else {
            return Ok(None);
        };
        Ok(Some(Pdu::decode(frame.freeze())?))
    }
}

impl Encoder<Pdu> for PduCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Pdu, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::with_capacity(HEADER_LEN);
        item.encode(&mut body)?;
        let frame: Bytes = body.freeze();
        self.inner.encode(frame, dst)?;
        Ok(())
    }
}
