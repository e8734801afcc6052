//! XCMP frame codec (encode/decode).
//!
//! # Format
//!
//! ```text
//! [LENGTH (2, BE)] [HEADER (2, BE)] [RESULT (1, responses only)] [PAYLOAD]
//! ```
//!
//! The length value counts everything after the two length bytes. The header
//! word packs the message type into its upper nibble and the 12-bit opcode
//! into the rest.

use bytes::Bytes;

use super::{
    HEADER_SIZE, LENGTH_PREFIX_SIZE, Message, MessageType, MIN_FRAME_SIZE, Opcode, ResultCode,
};
use crate::error::{Error, Result};

/// Pack a message type and opcode into the 16-bit header word.
#[must_use]
pub const fn pack_header(msg_type: MessageType, opcode: Opcode) -> u16 {
    ((msg_type.as_nibble() as u16) << 12) | opcode.value()
}

/// Split a header word back into its message type and opcode.
pub fn unpack_header(header: u16) -> Result<(MessageType, Opcode)> {
    let nibble = (header >> 12) as u8;
    let msg_type =
        MessageType::from_nibble(nibble).ok_or(Error::InvalidMessageType { nibble })?;
    Ok((msg_type, Opcode::new(header & 0x0FFF)))
}

/// Encode a message to its length-prefixed byte form.
#[must_use]
pub fn encode(message: &Message) -> Vec<u8> {
    let payload = message.payload();
    let result_len = usize::from(message.result().is_some());
    let declared = HEADER_SIZE + result_len + payload.len();

    let mut bytes = Vec::with_capacity(LENGTH_PREFIX_SIZE + declared);
    bytes.extend_from_slice(&(declared as u16).to_be_bytes());
    bytes.extend_from_slice(&pack_header(message.message_type(), message.opcode()).to_be_bytes());
    if let Some(result) = message.result() {
        bytes.push(result.as_u8());
    }
    bytes.extend_from_slice(payload);
    bytes
}

/// Decode a message from a complete length-prefixed frame.
///
/// The declared length must match the bytes present exactly; any
/// disagreement is a framing error on receive.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.len() < MIN_FRAME_SIZE {
        return Err(Error::BufferTooSmall {
            needed: MIN_FRAME_SIZE,
            got: bytes.len(),
        });
    }

    let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let available = bytes.len() - LENGTH_PREFIX_SIZE;
    if declared != available {
        return Err(Error::Framing {
            declared,
            available,
        });
    }

    let header = u16::from_be_bytes([bytes[2], bytes[3]]);
    let (msg_type, opcode) = unpack_header(header)?;

    let mut offset = LENGTH_PREFIX_SIZE + HEADER_SIZE;
    let result = if msg_type.has_result() {
        if declared < HEADER_SIZE + 1 {
            return Err(Error::BufferTooSmall {
                needed: MIN_FRAME_SIZE + 1,
                got: bytes.len(),
            });
        }
        let code = ResultCode::from_u8(bytes[offset]);
        offset += 1;
        Some(code)
    } else {
        None
    };

    let payload = Bytes::copy_from_slice(&bytes[offset..]);
    Ok(Message::from_parts(msg_type, opcode, result, payload))
}
