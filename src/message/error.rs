//! Errors raised while building outbound messages.

use thiserror::Error;

use super::DataCoding;

/// Reasons an outbound message could not be built.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The text contains a character the chosen coding cannot carry.
    #[error("character {character:?} cannot be encoded as {coding}")]
    Unrepresentable {
        /// Coding that was selected.
        coding: DataCoding,
        /// First offending character.
        character: char,
    },
    /// The encoded text exceeds the short message limit.
    #[error("encoded message is {len} octets; limit is {max}")]
    TooLong {
        /// Encoded length in octets.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// An address exceeds the protocol field width.
    #[error("address {address:?} is longer than {max} characters")]
    AddressTooLong {
        /// Offending address.
        address: String,
        /// Maximum accepted length.
        max: usize,
    },
}
