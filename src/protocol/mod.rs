//! XCMP protocol core: wire format, message model, and typed payloads.

mod codec;
mod display;
mod message;
mod softpot;
mod status;
mod types;

pub use codec::{decode, encode, pack_header, unpack_header};
pub use display::{
    DisplayContent, DisplayFunction, DisplayId, DisplayRegion, DisplayText, DisplayTimer,
    TextEncoding,
};
pub use message::Message;
pub use softpot::{Softpot, SoftpotOp, SoftpotType};
pub use status::{DeviceAttribute, DeviceInitStatus, DeviceStatus, InitType};
pub use types::{MessageType, Opcode, ResultCode};

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Size of the packed type/opcode header in bytes.
pub const HEADER_SIZE: usize = 2;

/// Smallest well-formed frame: length prefix plus header, no result, no payload.
pub const MIN_FRAME_SIZE: usize = LENGTH_PREFIX_SIZE + HEADER_SIZE;

/// Offset added to a request opcode to form its reply marker.
pub const REPLY_MARKER_OFFSET: u16 = 0x8000;
