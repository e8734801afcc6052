//! XNL session layer: frame codec, authentication cipher, session machine.
//!
//! XNL sits between the byte transport and XCMP. It assigns addresses,
//! tags data frames with a rollover counter and transaction id for ACK
//! correlation, and gates the connection behind a challenge/response
//! authentication built on a TEA-family block cipher.

mod frame;
mod session;
mod tea;

pub use frame::{XnlFlags, XnlFrame, XnlOpcode, XnlProtocol, HEADER_SIZE};
pub use session::XnlSession;
pub use tea::{encrypt_block, TeaKey, BLOCK_SIZE};
