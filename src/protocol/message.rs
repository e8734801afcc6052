//! XCMP message model.
//!
//! A message is decoded once into an owned value and encoded from that value
//! on send; payload bytes are never shared with a live wire buffer.

use bytes::Bytes;

use super::{MessageType, Opcode, ResultCode};

/// An XCMP control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    msg_type: MessageType,
    opcode: Opcode,
    result: Option<ResultCode>,
    payload: Bytes,
}

impl Message {
    /// Create a request message.
    pub fn request(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type: MessageType::Request,
            opcode,
            result: None,
            payload: payload.into(),
        }
    }

    /// Create a response message. Only responses carry a result byte.
    pub fn response(opcode: Opcode, result: ResultCode, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type: MessageType::Response,
            opcode,
            result: Some(result),
            payload: payload.into(),
        }
    }

    /// Create a broadcast message.
    pub fn broadcast(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type: MessageType::Broadcast,
            opcode,
            result: None,
            payload: payload.into(),
        }
    }

    pub(crate) fn from_parts(
        msg_type: MessageType,
        opcode: Opcode,
        result: Option<ResultCode>,
        payload: Bytes,
    ) -> Self {
        debug_assert_eq!(msg_type.has_result(), result.is_some());
        Self {
            msg_type,
            opcode,
            result,
            payload,
        }
    }

    /// Get the message type.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.msg_type
    }

    /// Get the opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Get the result code; `None` for requests and broadcasts.
    #[must_use]
    pub const fn result(&self) -> Option<ResultCode> {
        self.result
    }

    /// Get the payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Encode the message to its length-prefixed byte form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        super::encode(self)
    }

    /// Decode a message from a complete length-prefixed frame.
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        super::decode(bytes)
    }
}
