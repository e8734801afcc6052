//! Error taxonomy shared by every layer of the stack.

use thiserror::Error;

use crate::protocol::{MessageType, Opcode, ResultCode, SoftpotType};

/// Errors surfaced by codec, session, transport, and client operations.
///
/// No layer retries on its own: every failure propagates to the caller, and
/// a failure during session connect leaves the session disconnected.
#[derive(Error, Debug)]
pub enum Error {
    /// Declared frame length disagrees with the bytes actually present.
    #[error("framing error: declared {declared} bytes, {available} available")]
    Framing {
        /// Byte count claimed by the length field.
        declared: usize,
        /// Byte count actually present.
        available: usize,
    },

    /// Buffer too short to hold the smallest valid structure.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size.
        needed: usize,
        /// Actual size.
        got: usize,
    },

    /// Header carried a message-type nibble outside the known set.
    #[error("invalid message type nibble {nibble:#x}")]
    InvalidMessageType {
        /// Offending nibble.
        nibble: u8,
    },

    /// Received message type does not match what the exchange expected.
    #[error("unexpected reply type: expected {expected}, got {got}")]
    UnexpectedReplyType {
        /// Type the exchange was waiting for.
        expected: MessageType,
        /// Type actually received.
        got: MessageType,
    },

    /// Response opcode differs from the outstanding request opcode.
    #[error("opcode mismatch: request {request}, reply {reply}")]
    OpcodeMismatch {
        /// Opcode of the request.
        request: Opcode,
        /// Opcode carried by the reply.
        reply: Opcode,
    },

    /// Response result byte reported a failure.
    #[error("request failed: {0}")]
    ResultFailure(ResultCode),

    /// XNL connection reply rejected the authentication response.
    #[error("authentication rejected: {0}")]
    AuthFailure(ResultCode),

    /// DATA_MSG_ACK did not echo the outgoing transaction id and rollover.
    #[error(
        "ack mismatch: sent transaction {sent_transaction:#06x} rollover {sent_rollover}, \
         acked {acked_transaction:#06x} rollover {acked_rollover}"
    )]
    AckMismatch {
        /// Transaction id of the DATA_MSG that was sent.
        sent_transaction: u16,
        /// Transaction id echoed by the ACK.
        acked_transaction: u16,
        /// Rollover counter of the DATA_MSG that was sent.
        sent_rollover: u8,
        /// Rollover counter echoed by the ACK.
        acked_rollover: u8,
    },

    /// Display text declared an encoding byte this library does not speak.
    #[error("unsupported text encoding {encoding:#04x}")]
    UnsupportedEncoding {
        /// Encoding byte from the wire.
        encoding: u8,
    },

    /// Text cannot be represented in the selected encoding, or the encoded
    /// bytes are not valid for it.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Softpot value span is not 1, 2, or 4 bytes.
    #[error("unsupported softpot width: {width} bytes")]
    UnsupportedWidth {
        /// Offending width.
        width: usize,
    },

    /// Softpot response did not echo the softpot type of the request.
    #[error("softpot type mismatch: request {request}, reply {reply}")]
    SoftpotMismatch {
        /// Softpot type of the request.
        request: SoftpotType,
        /// Softpot type carried by the reply.
        reply: SoftpotType,
    },

    /// Transport receive or reply-marker scan expired without a frame.
    #[error("timed out waiting for a reply")]
    Timeout,

    /// Operation attempted on an unconnected client, session, or transport.
    #[error("not connected")]
    NotConnected,

    /// Underlying socket, serial, or subprocess I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Session-layer protocol violation outside the ACK discipline.
    #[error("session error: {0}")]
    Session(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
