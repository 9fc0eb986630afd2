//! Concatenation header carried by multi-part inbound messages.

use std::fmt;

/// Reference shared by every part of one concatenated message.
///
/// References are small and scoped to the sending SMSC, so they are reused
/// over time and are not globally unique.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConcatReference(pub u16);

impl From<u16> for ConcatReference {
    fn from(value: u16) -> Self { Self(value) }
}

impl From<u8> for ConcatReference {
    fn from(value: u8) -> Self { Self(u16::from(value)) }
}

impl fmt::Display for ConcatReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Header describing one part of a concatenated message.
///
/// `sequence` is 1-indexed, as on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ConcatHeader {
    /// Reference correlating the parts.
    pub reference: ConcatReference,
    /// Number of parts declared by the sender.
    pub total_parts: u8,
    /// Position of this part, starting at 1.
    pub sequence: u8,
}

impl ConcatHeader {
    /// Create a header for part `sequence` of `total_parts`.
    #[must_use]
    pub fn new(reference: impl Into<ConcatReference>, total_parts: u8, sequence: u8) -> Self {
        Self {
            reference: reference.into(),
            total_parts,
            sequence,
        }
    }

    /// Zero-based slot index, if the sequence lies within the declared total.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        if self.sequence == 0 || self.sequence > self.total_parts {
            return None;
        }
        Some(usize::from(self.sequence - 1))
    }
}
