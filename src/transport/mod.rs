//! Byte transports the protocol stack runs over.
//!
//! The stack only ever sees a connection-oriented byte pipe. The two
//! concrete pipes, a TCP/UDP socket and a PPP-over-serial bring-up, are
//! interchangeable, and [`crate::XnlSession`] implements the same contract
//! so it can slot in between either of them and the client.

mod ppp;
mod socket;

pub use ppp::{PppConfig, PppTransport};
pub use socket::{ConnectionKind, SocketTransport};

use crate::error::Result;

/// A connection-oriented byte pipe.
///
/// `receive` blocks until the peer has delivered at least one frame's worth
/// of bytes, but may return more or less than one frame per call; the
/// length-prefix framing above tolerates both. Disconnect is idempotent
/// and releases whatever the transport acquired on connect.
pub trait ByteTransport {
    /// Establish the connection.
    fn connect(&mut self) -> Result<()>;

    /// Tear the connection down. Safe to call repeatedly.
    fn disconnect(&mut self) -> Result<()>;

    /// Send a buffer in its entirety.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive whatever bytes the peer has delivered.
    fn receive(&mut self) -> Result<Vec<u8>>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
