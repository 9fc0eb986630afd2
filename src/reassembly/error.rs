//! Errors raised while accepting concatenated parts.

use thiserror::Error;

use super::ConcatReference;

/// Reasons a part was rejected by the [`ReassemblyTable`](super::ReassemblyTable).
///
/// A rejected part never alters the state stored for its reference.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The header declared zero total parts.
    #[error("reference {reference} declares zero parts")]
    ZeroParts {
        /// Reference carried by the part.
        reference: ConcatReference,
    },
    /// The sequence number lies outside `1..=total`.
    #[error("part {sequence} of reference {reference} is outside 1..={total}")]
    SequenceOutOfRange {
        /// Reference carried by the part.
        reference: ConcatReference,
        /// Sequence number carried by the part.
        sequence: u8,
        /// Total parts declared by the part.
        total: u8,
    },
    /// The part declares a different total than the first part seen.
    #[error("reference {reference} expects {expected} parts, part declares {found}")]
    TotalMismatch {
        /// Reference carried by the part.
        reference: ConcatReference,
        /// Total declared by the first part.
        expected: usize,
        /// Total declared by this part.
        found: u8,
    },
    /// The slot for this sequence is already filled.
    #[error("duplicate part {sequence} for reference {reference}")]
    DuplicatePart {
        /// Reference carried by the part.
        reference: ConcatReference,
        /// Sequence number that was repeated.
        sequence: u8,
    },
}
