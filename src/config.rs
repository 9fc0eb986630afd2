//! Client configuration types.
//!
//! [`Config`] gathers everything needed to build a [`Handler`]: the SMSC
//! endpoint and credentials in [`SmscConfig`] plus pool, window, rate-limit
//! and reassembly tuning. Values are checked eagerly by [`Config::validate`]
//! so a bad setting fails construction instead of surfacing later as a
//! protocol error.
//!
//! [`Handler`]: crate::handler::Handler

use std::{num::NonZeroUsize, time::Duration};

use static_assertions::const_assert;
use thiserror::Error;

use crate::{
    message::{EncodingPolicy, MessageTemplate},
    reassembly::ReassemblyPolicy,
};

/// Default number of bound sessions.
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Default cap on unacknowledged submissions.
pub const DEFAULT_MAX_OUTSTANDING: usize = 10;
/// Default number of submissions allowed per window across all sessions.
pub const DEFAULT_GLOBAL_LIMIT: usize = 100;
/// Default number of submissions allowed per window on one session.
pub const DEFAULT_PER_SESSION_LIMIT: usize = 20;
/// Default rate-limit window.
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(60);
/// Default pause after a rate-limited or exhausted attempt.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Default keep-alive period.
pub const DEFAULT_ENQUIRE_LINK: Duration = Duration::from_secs(2);
/// Default silence tolerated before a session is considered dead.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Default limit for connecting and binding.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest accepted system id, excluding the terminator.
pub const MAX_SYSTEM_ID_LEN: usize = 15;
/// Longest accepted password, excluding the terminator.
pub const MAX_PASSWORD_LEN: usize = 8;
/// Longest accepted system type, excluding the terminator.
pub const MAX_SYSTEM_TYPE_LEN: usize = 12;

const_assert!(DEFAULT_POOL_SIZE > 0);
const_assert!(DEFAULT_MAX_OUTSTANDING > 0);
const_assert!(DEFAULT_PER_SESSION_LIMIT > 0);
const_assert!(DEFAULT_PER_SESSION_LIMIT <= DEFAULT_GLOBAL_LIMIT);

const fn non_zero(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    }
}

/// Invalid configuration values.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Offending field.
        field: &'static str,
    },
    /// A value exceeds its protocol field width.
    #[error("{field} is {len} bytes; limit is {max}")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// A count or duration is zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field.
        field: &'static str,
    },
}

/// SMSC endpoint, credentials and per-session timers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmscConfig {
    /// Host name or address of the SMSC.
    pub host: String,
    /// TCP port of the SMSC.
    pub port: u16,
    /// Identity presented when binding.
    pub system_id: String,
    /// Secret presented when binding.
    pub password: String,
    /// Optional system type presented when binding.
    pub system_type: String,
    /// Period between keep-alive probes.
    pub enquire_link: Duration,
    /// Silence tolerated before the session is closed.
    pub read_timeout: Duration,
    /// Limit for connecting and for the bind response.
    pub bind_timeout: Duration,
}

impl SmscConfig {
    /// Endpoint and credentials with default timers.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            enquire_link: DEFAULT_ENQUIRE_LINK,
            read_timeout: DEFAULT_READ_TIMEOUT,
            bind_timeout: DEFAULT_BIND_TIMEOUT,
        }
    }

    /// Check the endpoint, credentials and timers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Empty { field: "host" });
        }
        if self.port == 0 {
            return Err(ConfigError::Zero { field: "port" });
        }
        if self.system_id.is_empty() {
            return Err(ConfigError::Empty { field: "system_id" });
        }
        check_len("system_id", &self.system_id, MAX_SYSTEM_ID_LEN)?;
        check_len("password", &self.password, MAX_PASSWORD_LEN)?;
        check_len("system_type", &self.system_type, MAX_SYSTEM_TYPE_LEN)?;
        check_duration("enquire_link", self.enquire_link)?;
        check_duration("read_timeout", self.read_timeout)?;
        check_duration("bind_timeout", self.bind_timeout)
    }
}

/// Complete client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Endpoint and credentials shared by every session.
    pub smsc: SmscConfig,
    /// Number of sessions bound at startup.
    pub pool_size: NonZeroUsize,
    /// Cap on unacknowledged submissions across the pool.
    pub max_outstanding: NonZeroUsize,
    /// Submissions allowed per window across all sessions.
    pub global_limit: NonZeroUsize,
    /// Submissions allowed per window on one session.
    pub per_session_limit: NonZeroUsize,
    /// Length of the rate-limit window.
    pub reset_interval: Duration,
    /// Pause before retrying a rate-limited or exhausted attempt.
    pub backoff: Duration,
    /// Eviction bounds for partial inbound messages.
    pub reassembly: ReassemblyPolicy,
    /// Data coding selection for outbound text.
    pub encoding: EncodingPolicy,
}

impl Config {
    /// Configuration for `smsc` with default tuning.
    #[must_use]
    pub fn new(smsc: SmscConfig) -> Self {
        Self {
            smsc,
            pool_size: non_zero(DEFAULT_POOL_SIZE),
            max_outstanding: non_zero(DEFAULT_MAX_OUTSTANDING),
            global_limit: non_zero(DEFAULT_GLOBAL_LIMIT),
            per_session_limit: non_zero(DEFAULT_PER_SESSION_LIMIT),
            reset_interval: DEFAULT_RESET_INTERVAL,
            backoff: DEFAULT_BACKOFF,
            reassembly: ReassemblyPolicy::default(),
            encoding: EncodingPolicy::default(),
        }
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.smsc.validate()?;
        check_duration("reset_interval", self.reset_interval)?;
        check_duration("backoff", self.backoff)?;
        if let Some(ttl) = self.reassembly.ttl {
            check_duration("reassembly_ttl", ttl)?;
        }
        Ok(())
    }

    /// Message template using the configured encoding.
    #[must_use]
    pub fn message_template(&self) -> MessageTemplate {
        MessageTemplate::default().with_encoding(self.encoding)
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ConfigError> {
    if value.len() > max {
        return Err(ConfigError::TooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

fn check_duration(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Zero { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn config() -> Config { Config::new(SmscConfig::new("smsc.local", 2775, "esme", "secret")) }

    #[rstest]
    fn defaults_validate(config: Config) {
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.pool_size.get(), 10);
        assert_eq!(config.max_outstanding.get(), 10);
        assert_eq!(config.global_limit.get(), 100);
        assert_eq!(config.per_session_limit.get(), 20);
    }

    #[rstest]
    #[case::empty_host(|c: &mut Config| c.smsc.host = " ".into(), ConfigError::Empty { field: "host" })]
    #[case::zero_port(|c: &mut Config| c.smsc.port = 0, ConfigError::Zero { field: "port" })]
    #[case::empty_system_id(
        |c: &mut Config| c.smsc.system_id.clear(),
        ConfigError::Empty { field: "system_id" }
    )]
    #[case::long_password(
        |c: &mut Config| c.smsc.password = "123456789".into(),
        ConfigError::TooLong { field: "password", len: 9, max: 8 }
    )]
    #[case::zero_backoff(|c: &mut Config| c.backoff = Duration::ZERO, ConfigError::Zero { field: "backoff" })]
    #[case::zero_ttl(
        |c: &mut Config| c.reassembly.ttl = Some(Duration::ZERO),
        ConfigError::Zero { field: "reassembly_ttl" }
    )]
    fn invalid_values_name_the_field(
        mut config: Config,
        #[case] mutate: fn(&mut Config),
        #[case] expected: ConfigError,
    ) {
        mutate(&mut config);
        assert_eq!(config.validate(), Err(expected));
    }
}
