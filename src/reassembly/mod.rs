//! Reassembly of concatenated inbound messages.
//!
//! The [`ReassemblyTable`] collects parts keyed by [`ConcatReference`]. Each
//! reference moves through three states:
//!
//! - absent: no part seen yet;
//! - partial: a slot vector sized by the first part's declared total, with
//!   some slots filled;
//! - complete: the last empty slot was filled, the parts are joined in
//!   sequence order and the reference is removed.
//!
//! Parts are placed by their sequence number, never by arrival order.
//! Partial references older than the configured TTL are purged, and the
//! number of partial references is capped so a peer that never completes its
//! messages cannot grow the table without bound.

mod error;
mod header;

use std::{
    collections::{HashMap, hash_map::Entry},
    num::NonZeroUsize,
    time::{Duration, Instant},
};

pub use error::ReassemblyError;
pub use header::{ConcatHeader, ConcatReference};
use tracing::warn;

/// Default lifetime of a partial reference.
pub const DEFAULT_REASSEMBLY_TTL: Duration = Duration::from_secs(300);
/// Default cap on simultaneously partial references.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Eviction bounds for partial references.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReassemblyPolicy {
    /// Partial references older than this are discarded. `None` keeps them
    /// until they complete.
    pub ttl: Option<Duration>,
    /// Maximum number of partial references. When full, the oldest one is
    /// evicted to admit a new reference. `None` removes the cap.
    pub max_pending: Option<NonZeroUsize>,
}

impl Default for ReassemblyPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_REASSEMBLY_TTL),
            max_pending: NonZeroUsize::new(DEFAULT_MAX_PENDING),
        }
    }
}

impl ReassemblyPolicy {
    /// Policy that never evicts partial references.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            ttl: None,
            max_pending: None,
        }
    }
}

#[derive(Debug)]
struct PartialMessage {
    slots: Vec<Option<String>>,
    filled: usize,
    started_at: Instant,
}

impl PartialMessage {
    fn new(total_parts: u8, started_at: Instant) -> Self {
        Self {
            slots: vec![None; usize::from(total_parts)],
            filled: 0,
            started_at,
        }
    }

    fn is_complete(&self) -> bool { self.filled == self.slots.len() }

    fn join(self) -> String { self.slots.into_iter().flatten().collect() }
}

/// Table of partially received concatenated messages.
///
/// # Examples
///
/// ```
/// use smpp_pool::reassembly::{ConcatHeader, ReassemblyTable};
///
/// let mut table = ReassemblyTable::default();
/// assert_eq!(table.accept(ConcatHeader::new(5u8, 2, 2), "world".into()), Ok(None));
/// let joined = table
///     .accept(ConcatHeader::new(5u8, 2, 1), "hello ".into())
///     .expect("valid part");
/// assert_eq!(joined.as_deref(), Some("hello world"));
/// assert_eq!(table.pending_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    policy: ReassemblyPolicy,
    pending: HashMap<ConcatReference, PartialMessage>,
}

impl ReassemblyTable {
    /// Create a table with the given eviction policy.
    #[must_use]
    pub fn new(policy: ReassemblyPolicy) -> Self {
        Self {
            policy,
            pending: HashMap::new(),
        }
    }

    /// Accept one part, returning the joined message when it completes.
    ///
    /// # Errors
    ///
    /// Returns a [`ReassemblyError`] when the header is malformed or the
    /// slot is already filled. The stored state for the reference is left
    /// untouched in that case.
    pub fn accept(
        &mut self,
        header: ConcatHeader,
        text: String,
    ) -> Result<Option<String>, ReassemblyError> {
        self.accept_at(header, text, Instant::now())
    }

    /// Accept one part using an explicit clock reading.
    ///
    /// See [`accept`](Self::accept) for details.
    ///
    /// # Errors
    ///
    /// Returns a [`ReassemblyError`] when the header is malformed or the
    /// slot is already filled.
    pub fn accept_at(
        &mut self,
        header: ConcatHeader,
        text: String,
        now: Instant,
    ) -> Result<Option<String>, ReassemblyError> {
        self.purge_expired_at(now);

        let reference = header.reference;
        if header.total_parts == 0 {
            return Err(ReassemblyError::ZeroParts { reference });
        }
        let slot = header
            .slot()
            .ok_or(ReassemblyError::SequenceOutOfRange {
                reference,
                sequence: header.sequence,
                total: header.total_parts,
            })?;

        if !self.pending.contains_key(&reference) {
            if header.total_parts == 1 {
                return Ok(Some(text));
            }
            self.make_room();
        }

        let mut entry = match self.pending.entry(reference) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(entry) => {
                entry.insert_entry(PartialMessage::new(header.total_parts, now))
            }
        };

        let partial = entry.get_mut();
        if partial.slots.len() != usize::from(header.total_parts) {
            return Err(ReassemblyError::TotalMismatch {
                reference,
                expected: partial.slots.len(),
                found: header.total_parts,
            });
        }
        let target = &mut partial.slots[slot];
        if target.is_some() {
            return Err(ReassemblyError::DuplicatePart {
                reference,
                sequence: header.sequence,
            });
        }
        *target = Some(text);
        partial.filled += 1;

        if partial.is_complete() {
            return Ok(Some(entry.remove().join()));
        }
        Ok(None)
    }

    /// Remove partial references older than the configured TTL.
    ///
    /// Returns the evicted references.
    pub fn purge_expired(&mut self) -> Vec<ConcatReference> {
        self.purge_expired_at(Instant::now())
    }

    /// Remove expired partial references using an explicit clock reading.
    ///
    /// Returns the evicted references.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<ConcatReference> {
        let Some(ttl) = self.policy.ttl else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        self.pending.retain(|reference, partial| {
            let expired = now.saturating_duration_since(partial.started_at) >= ttl;
            if expired {
                warn!(
                    %reference,
                    received = partial.filled,
                    total = partial.slots.len(),
                    "discarding expired partial message"
                );
                evicted.push(*reference);
            }
            !expired
        });
        evicted
    }

    /// Evict the oldest partial reference when the pending cap is reached.
    fn make_room(&mut self) {
        let Some(max_pending) = self.policy.max_pending else {
            return;
        };
        if self.pending.len() < max_pending.get() {
            return;
        }
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, partial)| partial.started_at)
            .map(|(reference, _)| *reference);
        if let Some(reference) = oldest {
            self.pending.remove(&reference);
            warn!(
                %reference,
                max_pending = max_pending.get(),
                "evicting oldest partial message"
            );
        }
    }

    /// Whether a partial entry exists for `reference`.
    #[must_use]
    pub fn contains(&self, reference: ConcatReference) -> bool {
        self.pending.contains_key(&reference)
    }

    /// Number of partial references currently held.
    #[must_use]
    pub fn pending_count(&self) -> usize { self.pending.len() }
}
