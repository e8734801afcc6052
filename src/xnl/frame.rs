//! XNL frame codec.
//!
//! # Format
//!
//! ```text
//!  0               2       3       4       6       8       10      12
//! +---------------+-------+-------+-------+-------+-------+-------+----
//! | opcode        | proto | flags | dest  | src   | txid  | len   | payload
//! +---------------+-------+-------+-------+-------+-------+-------+----
//! ```
//!
//! All multi-byte fields are big-endian. The payload length is
//! authoritative: trailing bytes beyond it are logged and ignored.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Error, Result};

/// Size of the fixed XNL header in bytes.
pub const HEADER_SIZE: usize = 12;

/// XNL opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XnlOpcode(u16);

impl XnlOpcode {
    /// Master announces itself, solicited or not.
    pub const MASTER_STATUS_BROADCAST: Self = Self(0x0002);
    /// Ask who the master is.
    pub const DEVICE_MASTER_QUERY: Self = Self(0x0003);
    /// Request an authentication challenge.
    pub const DEVICE_AUTH_KEY_REQUEST: Self = Self(0x0004);
    /// Challenge plus temporary address.
    pub const DEVICE_AUTH_KEY_REPLY: Self = Self(0x0005);
    /// Present the encrypted challenge response.
    pub const DEVICE_CONN_REQUEST: Self = Self(0x0006);
    /// Accept or reject the connection.
    pub const DEVICE_CONN_REPLY: Self = Self(0x0007);
    /// Carry an XCMP message.
    pub const DATA_MSG: Self = Self(0x000B);
    /// Acknowledge a DATA_MSG.
    pub const DATA_MSG_ACK: Self = Self(0x000C);

    /// Construct from a raw value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for XnlOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Protocol carried in an XNL frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum XnlProtocol {
    /// XNL's own control traffic.
    Control = 0x00,
    /// An XCMP message.
    Xcmp = 0x01,
}

impl XnlProtocol {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Control),
            0x01 => Some(Self::Xcmp),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// XNL flags byte: a 3-bit rollover counter plus the ack-needed bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XnlFlags(u8);

impl XnlFlags {
    /// Mask selecting the rollover counter.
    pub const ROLLOVER_MASK: u8 = 0x07;
    /// Sender wants a DATA_MSG_ACK.
    pub const ACK_NEEDED: u8 = 1 << 3;

    /// Build a flags byte from a rollover counter and the ack-needed bit.
    #[must_use]
    pub const fn new(rollover: u8, ack_needed: bool) -> Self {
        let mut value = rollover & Self::ROLLOVER_MASK;
        if ack_needed {
            value |= Self::ACK_NEEDED;
        }
        Self(value)
    }

    /// Wrap a raw flags byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    /// Raw byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Rollover counter, 0–7.
    #[must_use]
    pub const fn rollover(self) -> u8 {
        self.0 & Self::ROLLOVER_MASK
    }

    /// Whether the sender wants an ACK.
    #[must_use]
    pub const fn ack_needed(self) -> bool {
        self.0 & Self::ACK_NEEDED != 0
    }
}

/// A complete XNL frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XnlFrame {
    /// Frame opcode.
    pub opcode: XnlOpcode,
    /// Protocol carried in the payload.
    pub protocol: XnlProtocol,
    /// Rollover counter and ack-needed bit.
    pub flags: XnlFlags,
    /// Destination address.
    pub dest: u16,
    /// Source address.
    pub source: u16,
    /// Transaction id.
    pub transaction_id: u16,
    /// Payload bytes; zero length is valid.
    pub payload: Bytes,
}

impl XnlFrame {
    /// Build a control frame (protocol XNL-CTRL, no flags).
    pub fn control(
        opcode: XnlOpcode,
        dest: u16,
        source: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            opcode,
            protocol: XnlProtocol::Control,
            flags: XnlFlags::default(),
            dest,
            source,
            transaction_id: 0,
            payload: payload.into(),
        }
    }

    /// Encode to the 12-byte header plus payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.opcode.value().to_be_bytes());
        bytes.push(self.protocol.as_u8());
        bytes.push(self.flags.as_u8());
        bytes.extend_from_slice(&self.dest.to_be_bytes());
        bytes.extend_from_slice(&self.source.to_be_bytes());
        bytes.extend_from_slice(&self.transaction_id.to_be_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode a frame from bytes.
    ///
    /// The header's payload length is authoritative; bytes past it are
    /// logged and dropped. A payload shorter than declared is a framing
    /// error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        let opcode = XnlOpcode::new(u16::from_be_bytes([bytes[0], bytes[1]]));
        let protocol = XnlProtocol::from_u8(bytes[2])
            .ok_or_else(|| Error::Session(format!("unknown XNL protocol id {:#04x}", bytes[2])))?;
        let flags = XnlFlags::from_u8(bytes[3]);
        let dest = u16::from_be_bytes([bytes[4], bytes[5]]);
        let source = u16::from_be_bytes([bytes[6], bytes[7]]);
        let transaction_id = u16::from_be_bytes([bytes[8], bytes[9]]);
        let payload_len = u16::from_be_bytes([bytes[10], bytes[11]]) as usize;

        let available = bytes.len() - HEADER_SIZE;
        if available < payload_len {
            return Err(Error::Framing {
                declared: payload_len,
                available,
            });
        }
        if available > payload_len {
            debug!(
                trailing = available - payload_len,
                "ignoring bytes past declared XNL payload"
            );
        }

        let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + payload_len]);
        Ok(Self {
            opcode,
            protocol,
            flags,
            dest,
            source,
            transaction_id,
            payload,
        })
    }
}
