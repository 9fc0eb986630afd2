//! Public API for the `smpp_pool` library.
//!
//! This crate provides a pooled SMPP transceiver client: a fixed set of bound
//! sessions shared by submitters, a window bounding unacknowledged requests,
//! global and per-session rate limiting, and reassembly of concatenated
//! inbound messages.

pub mod config;
pub mod dispatch;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod pool;
pub mod rate_limit;
pub mod reassembly;
pub mod session;
pub mod smpp;

pub use config::{Config, ConfigError, SmscConfig};
pub use dispatch::{CompletedMessage, InboundDispatcher, MessageCallback};
pub use handler::{FailedMessage, Handler, HandlerError, SendError, SendReport};
pub use message::{DataCoding, EncodingPolicy, MessageTemplate, OutboundMessage};
pub use pool::{LentSession, SessionPool, SubmitError, SubmitWindow};
pub use rate_limit::{RateLimiter, ResetTask};
pub use session::{Notification, Session, SessionConnector, SessionId};
pub use smpp::{TcpConnector, TcpSession, TransportError};
