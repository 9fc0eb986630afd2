//! Command line interface for the `smpp-pool` binary.
//!
//! Every option can also be supplied through the environment. The endpoint
//! and credentials have no defaults, so startup fails with a descriptive
//! error when they are missing.

use std::{net::SocketAddr, num::NonZeroUsize};

use clap::{Parser, ValueEnum};

/// Data coding used for outbound text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    /// SMSC default alphabet, ASCII only.
    Default,
    /// ISO-8859-1.
    Latin1,
    /// UCS-2, big-endian.
    Ucs2,
    /// Narrowest coding able to carry each message.
    Narrowest,
}

/// Command line arguments for the `smpp-pool` binary.
#[derive(Debug, Parser)]
#[command(
    name = "smpp-pool",
    version,
    about = "Submit short messages through a pool of SMPP transceiver sessions"
)]
pub struct Cli {
    /// SMSC host name or address.
    #[arg(long, env = "SMSC_HOST")]
    pub host: String,
    /// SMSC TCP port.
    #[arg(long, env = "SMSC_PORT")]
    pub port: u16,
    /// System id presented when binding.
    #[arg(long, env = "SYSTEM_ID")]
    pub system_id: String,
    /// Password presented when binding.
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,
    /// System type presented when binding.
    #[arg(long, env = "SYSTEM_TYPE", default_value = "")]
    pub system_type: String,
    /// Number of sessions to bind.
    #[arg(long, env = "POOL_SIZE", default_value = "10")]
    pub pool_size: NonZeroUsize,
    /// Maximum unacknowledged submissions across the pool.
    #[arg(long, env = "MAX_OUTSTANDING", default_value = "10")]
    pub max_outstanding: NonZeroUsize,
    /// Submissions allowed per window across all sessions.
    #[arg(long, env = "GLOBAL_LIMIT", default_value = "100")]
    pub global_limit: NonZeroUsize,
    /// Submissions allowed per window on one session.
    #[arg(long, env = "PER_SESSION_LIMIT", default_value = "20")]
    pub per_session_limit: NonZeroUsize,
    /// Length of the rate-limit window in seconds.
    #[arg(long, env = "RESET_INTERVAL_SECS", default_value_t = 60)]
    pub reset_interval_secs: u64,
    /// Pause before retrying a rate-limited message, in milliseconds.
    #[arg(long, env = "BACKOFF_MS", default_value_t = 1000)]
    pub backoff_ms: u64,
    /// Keep-alive period in seconds.
    #[arg(long, env = "ENQUIRE_LINK_SECS", default_value_t = 2)]
    pub enquire_link_secs: u64,
    /// Silence tolerated before a session is dropped, in seconds.
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value_t = 10)]
    pub read_timeout_secs: u64,
    /// Connect and bind timeout in seconds.
    #[arg(long, env = "BIND_TIMEOUT_SECS", default_value_t = 5)]
    pub bind_timeout_secs: u64,
    /// Lifetime of a partial inbound message in seconds.
    #[arg(long, env = "REASSEMBLY_TTL_SECS", default_value_t = 300)]
    pub reassembly_ttl_secs: u64,
    /// Maximum partial inbound messages held at once.
    #[arg(long, env = "REASSEMBLY_MAX_PENDING", default_value = "256")]
    pub reassembly_max_pending: NonZeroUsize,
    /// Data coding for outbound text.
    #[arg(long, env = "ENCODING", value_enum, default_value_t = Encoding::Ucs2)]
    pub encoding: Encoding,
    /// Number of `MSG <n>` messages to send.
    #[arg(long, default_value_t = 1800)]
    pub count: usize,
    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// Every environment variable the CLI reads.
#[cfg(test)]
pub(crate) const ENV_VARS: [&str; 18] = [
    "SMSC_HOST",
    "SMSC_PORT",
    "SYSTEM_ID",
    "PASSWORD",
    "SYSTEM_TYPE",
    "POOL_SIZE",
    "MAX_OUTSTANDING",
    "GLOBAL_LIMIT",
    "PER_SESSION_LIMIT",
    "RESET_INTERVAL_SECS",
    "BACKOFF_MS",
    "ENQUIRE_LINK_SECS",
    "READ_TIMEOUT_SECS",
    "BIND_TIMEOUT_SECS",
    "REASSEMBLY_TTL_SECS",
    "REASSEMBLY_MAX_PENDING",
    "ENCODING",
    "METRICS_ADDR",
];

/// Remove every CLI environment variable so defaults are observable.
///
/// Callers must be `#[serial(env)]`.
#[cfg(test)]
pub(crate) fn clear_environment() {
    for key in ENV_VARS {
        // SAFETY: callers are serialised with every other test touching the
        // environment.
        unsafe { std::env::remove_var(key) };
    }
}

#[cfg(test)]
mod tests {
    use clap::{Parser, error::ErrorKind};
    use serial_test::serial;

    use super::{Cli, Encoding, clear_environment};

    const REQUIRED: [&str; 9] = [
        "smpp-pool",
        "--host",
        "smsc.local",
        "--port",
        "2775",
        "--system-id",
        "esme",
        "--password",
        "secret",
    ];

    #[test]
    #[serial(env)]
    fn parses_required_options_with_defaults() {
        clear_environment();
        let cli = Cli::try_parse_from(REQUIRED).expect("valid arguments");
        assert_eq!(cli.host, "smsc.local");
        assert_eq!(cli.port, 2775);
        assert_eq!(cli.pool_size.get(), 10);
        assert_eq!(cli.max_outstanding.get(), 10);
        assert_eq!(cli.global_limit.get(), 100);
        assert_eq!(cli.per_session_limit.get(), 20);
        assert_eq!(cli.encoding, Encoding::Ucs2);
        assert_eq!(cli.count, 1800);
        assert!(cli.metrics_addr.is_none());
    }

    #[test]
    #[serial(env)]
    fn missing_credentials_are_rejected() {
        clear_environment();
        let err = Cli::try_parse_from(["smpp-pool", "--host", "smsc.local", "--port", "2775"])
            .expect_err("system id and password missing");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    #[serial(env)]
    fn zero_pool_size_is_rejected() {
        clear_environment();
        let mut args = REQUIRED.to_vec();
        args.extend(["--pool-size", "0"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    #[serial(env)]
    fn environment_supplies_endpoint() {
        clear_environment();
        // SAFETY: serialised with every other test reading the environment.
        unsafe {
            std::env::set_var("SMSC_HOST", "env.local");
            std::env::set_var("SMSC_PORT", "2776");
            std::env::set_var("SYSTEM_ID", "envid");
            std::env::set_var("PASSWORD", "envpw");
        }
        let parsed = Cli::try_parse_from(["smpp-pool", "--encoding", "narrowest"]);
        clear_environment();
        let cli = parsed.expect("environment fallback");
        assert_eq!(cli.host, "env.local");
        assert_eq!(cli.port, 2776);
        assert_eq!(cli.system_id, "envid");
        assert_eq!(cli.encoding, Encoding::Narrowest);
    }
}
