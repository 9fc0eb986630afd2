//! Unit tests for message construction and text codings.

use rstest::rstest;

use super::{
    Address,
    DataCoding,
    EncodingPolicy,
    MAX_SHORT_MESSAGE_LEN,
    MessageError,
    MessageTemplate,
};

#[test]
fn default_template_matches_fixed_addressing() {
    let message = MessageTemplate::default()
        .build("MSG 0")
        .expect("ascii text encodes");
    assert_eq!(message.source().ton(), 5);
    assert_eq!(message.source().npi(), 0);
    assert_eq!(message.source().value(), "00522241");
    assert_eq!(message.destination().ton(), 1);
    assert_eq!(message.destination().npi(), 1);
    assert_eq!(message.destination().value(), "99522241");
    assert_eq!(message.registered_delivery(), 1);
    assert_eq!(message.esm_class(), 0);
    assert_eq!(message.data_coding(), DataCoding::Ucs2);
    assert_eq!(message.payload().as_ref(), b"\0M\0S\0G\0 \00");
}

#[rstest]
#[case::ascii("hello", DataCoding::Default)]
#[case::latin1("caf\u{e9}", DataCoding::Latin1)]
#[case::wide("\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442}", DataCoding::Ucs2)]
fn narrowest_policy_picks_smallest_coding(#[case] text: &str, #[case] expected: DataCoding) {
    let message = MessageTemplate::default()
        .with_encoding(EncodingPolicy::Narrowest)
        .build(text)
        .expect("encodable");
    assert_eq!(message.data_coding(), expected);
}

#[rstest]
#[case::default(DataCoding::Default, "caf\u{e9}", '\u{e9}')]
#[case::latin1(DataCoding::Latin1, "\u{20ac}5", '\u{20ac}')]
fn fixed_coding_rejects_unrepresentable_text(
    #[case] coding: DataCoding,
    #[case] text: &str,
    #[case] character: char,
) {
    let err = MessageTemplate::default()
        .with_encoding(EncodingPolicy::Fixed(coding))
        .build(text)
        .expect_err("text does not fit coding");
    assert_eq!(err, MessageError::Unrepresentable { coding, character });
}

#[test]
fn oversized_body_is_rejected() {
    // 128 UCS2 characters encode to 256 octets.
    let text = "x".repeat(128);
    let err = MessageTemplate::default()
        .build(&text)
        .expect_err("too long");
    assert_eq!(
        err,
        MessageError::TooLong {
            len: 256,
            max: MAX_SHORT_MESSAGE_LEN,
        }
    );
}

#[test]
fn long_addresses_are_rejected() {
    let err = Address::new(1, 1, "1".repeat(21)).expect_err("address too long");
    assert!(matches!(err, MessageError::AddressTooLong { max: 20, .. }));
}

#[rstest]
#[case::ucs2(0x08, &[0x04, 0x1F, 0x00, 0x21], "\u{41f}!")]
#[case::latin1(0x03, &[0x63, 0x61, 0x66, 0xE9], "caf\u{e9}")]
#[case::default(0x00, b"plain", "plain")]
#[case::unknown_falls_back(0xF5, &[0x41, 0xE9], "A\u{e9}")]
fn decode_uses_data_coding(#[case] code: u8, #[case] octets: &[u8], #[case] expected: &str) {
    assert_eq!(DataCoding::decode(code, octets), expected);
}
