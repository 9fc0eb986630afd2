//! SMPP v3.4 transport: PDU model, framing codec and the TCP session.

mod codec;
mod error;
pub mod pdu;
mod session;
pub mod udh;

pub use codec::{DEFAULT_MAX_PDU_LEN, PduCodec};
pub use error::{PduError, TransportError};
pub use pdu::{Pdu, PduBody};
pub use session::{MAX_SEQUENCE, TcpConnector, TcpSession};
