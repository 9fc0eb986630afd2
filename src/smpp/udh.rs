//! User data header parsing for concatenated short messages.

use super::PduError;
use crate::reassembly::{ConcatHeader, ConcatReference};

/// ESM class bit announcing a user data header.
pub const UDHI: u8 = 0x40;
/// Mask over the ESM class message-type bits.
pub const MESSAGE_TYPE_MASK: u8 = 0x3C;
/// Message type value marking a delivery receipt.
pub const DELIVERY_RECEIPT: u8 = 0x04;

const IE_CONCAT_8BIT: u8 = 0x00;
const IE_CONCAT_16BIT: u8 = 0x08;

/// Whether `esm_class` marks a delivery receipt.
#[must_use]
pub const fn is_receipt(esm_class: u8) -> bool { esm_class & MESSAGE_TYPE_MASK == DELIVERY_RECEIPT }

/// Split a short message into its concatenation header and text octets.
///
/// Without the UDHI flag the payload is returned untouched. With it, the
/// header is stripped and the first concatenation element, if any, is
/// returned. Other information elements are skipped.
///
/// # Errors
///
/// Returns [`PduError::MalformedUdh`] if the header overruns the payload.
pub fn split_concat(esm_class: u8, payload: &[u8]) -> Result<(Option<ConcatHeader>, &[u8]), PduError> {
    if esm_class & UDHI == 0 {
        return Ok((None, payload));
    }
    let (&udh_len, rest) = payload.split_first().ok_or(PduError::MalformedUdh)?;
    let udh_len = usize::from(udh_len);
    if rest.len() < udh_len {
        return Err(PduError::MalformedUdh);
    }
    let (mut elements, text) = rest.split_at(udh_len);
    let mut concat = None;
    while let [id, len, tail @ ..] = elements {
        let len = usize::from(*len);
        if tail.len() < len {
            return Err(PduError::MalformedUdh);
        }
        let (data, next) = tail.split_at(len);
        if concat.is_none() {
            concat = match (*id, data) {
                (IE_CONCAT_8BIT, [reference, total, sequence]) => Some(ConcatHeader::new(
                    ConcatReference::from(*reference),
                    *total,
                    *sequence,
                )),
                (IE_CONCAT_16BIT, [hi, lo, total, sequence]) => Some(ConcatHeader::new(
                    u16::from_be_bytes([*hi, *lo]),
                    *total,
                    *sequence,
                )),
                (IE_CONCAT_8BIT | IE_CONCAT_16BIT, _) => return Err(PduError::MalformedUdh),
                _ => None,
            };
        }
        elements = next;
    }
    if !elements.is_empty() {
        return Err(PduError::MalformedUdh);
    }
    Ok((concat, text))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn plain_payload_passes_through() {
        let (concat, text) = split_concat(0, b"hello").expect("no udh");
        assert!(concat.is_none());
        assert_eq!(text, b"hello");
    }

    #[rstest]
    #[case::eight_bit(&[0x05, 0x00, 0x03, 0x2A, 0x03, 0x02, b'B'], 0x2A)]
    #[case::sixteen_bit(&[0x06, 0x08, 0x04, 0x01, 0x02, 0x03, 0x02, b'B'], 0x0102)]
    fn concat_element_is_extracted(#[case] payload: &[u8], #[case] reference: u16) {
        let (concat, text) = split_concat(UDHI, payload).expect("valid udh");
        assert_eq!(concat, Some(ConcatHeader::new(reference, 3, 2)));
        assert_eq!(text, b"B");
    }

    #[test]
    fn unrelated_elements_are_skipped() {
        let payload = [0x08, 0x24, 0x01, 0x00, 0x00, 0x03, 0x07, 0x02, 0x01, b'x'];
        let (concat, text) = split_concat(UDHI, &payload).expect("valid udh");
        assert_eq!(concat, Some(ConcatHeader::new(7u8, 2, 1)));
        assert_eq!(text, b"x");
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::header_overruns(&[0x05, 0x00, 0x03])]
    #[case::element_overruns(&[0x03, 0x00, 0x03, 0x01])]
    #[case::bad_concat_len(&[0x04, 0x00, 0x02, 0x01, 0x02])]
    fn malformed_headers_are_rejected(#[case] payload: &[u8]) {
        assert_eq!(split_concat(UDHI, payload), Err(PduError::MalformedUdh));
    }

    #[rstest]
    #[case(0x04, true)]
    #[case(0x44, true)]
    #[case(0x00, false)]
    #[case(0x08, false)]
    fn receipt_flag(#[case] esm_class: u8, #[case] expected: bool) {
        assert_eq!(is_receipt(esm_class), expected);
    }
}
