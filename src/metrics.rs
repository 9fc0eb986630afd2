//! Metric helpers for the SMPP client.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking accepted submissions.
pub const SUBMITTED_TOTAL: &str = "smpp_submitted_total";
/// Name of the counter tracking failed submissions.
pub const SUBMIT_FAILURES_TOTAL: &str = "smpp_submit_failures_total";
/// Name of the counter tracking submit acknowledgments.
pub const ACKS_TOTAL: &str = "smpp_acks_total";
/// Name of the counter tracking rate-limited attempts.
pub const RATE_LIMITED_TOTAL: &str = "smpp_rate_limited_total";
/// Name of the counter tracking completed inbound messages.
pub const INBOUND_MESSAGES_TOTAL: &str = "smpp_inbound_messages_total";
/// Name of the counter tracking dropped inbound parts.
pub const DROPPED_PARTS_TOTAL: &str = "smpp_dropped_parts_total";
/// Name of the gauge tracking unacknowledged submissions.
pub const OUTSTANDING: &str = "smpp_outstanding";

/// Outcome of an acknowledgment.
#[derive(Clone, Copy, Debug)]
pub enum AckOutcome {
    /// The SMSC accepted the message.
    Accepted,
    /// The SMSC rejected the message.
    Rejected,
    /// The session stopped before an answer arrived.
    Abandoned,
}

impl AckOutcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            AckOutcome::Accepted => "accepted",
            AckOutcome::Rejected => "rejected",
            AckOutcome::Abandoned => "abandoned",
        }
    }
}

/// Record a submission written to a session.
pub fn inc_submitted() {
    #[cfg(feature = "metrics")]
    counter!(SUBMITTED_TOTAL).increment(1);
}

/// Record a submission that failed on the transport.
pub fn inc_submit_failures() {
    #[cfg(feature = "metrics")]
    counter!(SUBMIT_FAILURES_TOTAL).increment(1);
}

/// Record an acknowledgment with the given outcome.
pub fn inc_acks(outcome: AckOutcome) {
    #[cfg(feature = "metrics")]
    counter!(ACKS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record an attempt refused by the rate limiter.
pub fn inc_rate_limited() {
    #[cfg(feature = "metrics")]
    counter!(RATE_LIMITED_TOTAL).increment(1);
}

/// Record a completed inbound message.
pub fn inc_inbound_messages() {
    #[cfg(feature = "metrics")]
    counter!(INBOUND_MESSAGES_TOTAL).increment(1);
}

/// Record an inbound part that was discarded.
pub fn inc_dropped_parts() {
    #[cfg(feature = "metrics")]
    counter!(DROPPED_PARTS_TOTAL).increment(1);
}

/// Publish the current number of unacknowledged submissions.
#[allow(clippy::cast_precision_loss)]
pub fn set_outstanding(outstanding: usize) {
    #[cfg(feature = "metrics")]
    gauge!(OUTSTANDING).set(outstanding as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = outstanding;
}
