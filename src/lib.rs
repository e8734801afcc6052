//! XCMP/XNL client stack for land-mobile radios.
//!
//! This library speaks the two-wire control stack used to manage land-mobile
//! radios: XCMP, the outer control-message protocol (length-prefixed typed
//! messages), layered over XNL, the session protocol that provides
//! addressing, ACK-based reliability, and symmetric-key authentication.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xcmp::{ConnectionKind, SocketTransport, XcmpClient};
//!
//! let transport = SocketTransport::new("192.168.10.1", 8002, ConnectionKind::Tcp);
//! let mut client = XcmpClient::new(Box::new(transport));
//! client.connect()?;
//!
//! assert!(client.ping()?);
//! println!("serial: {}", client.get_serial()?);
//! # Ok::<(), xcmp::Error>(())
//! ```
//!
//! Radios reached through their XNL port require the session layer in
//! between; wrap the socket in an [`XnlSession`] carrying the radio's
//! authentication key material:
//!
//! ```rust,no_run
//! use xcmp::{ConnectionKind, SocketTransport, TeaKey, XcmpClient, XnlSession};
//!
//! let socket = SocketTransport::new("192.168.10.1", 8002, ConnectionKind::Tcp);
//! let session = XnlSession::new(Box::new(socket), TeaKey::default());
//! let mut client = XcmpClient::new(Box::new(session));
//! client.connect()?;
//! # Ok::<(), xcmp::Error>(())
//! ```
//!
//! # Layering
//!
//! - [`protocol`]: the XCMP wire format, message model, and typed payload
//!   views (display text, softpots, device-init-status).
//! - [`xnl`]: the XNL frame codec, the TEA-family authentication cipher,
//!   and the session state machine.
//! - [`transport`]: the byte-pipe abstraction plus TCP/UDP and PPP-serial
//!   implementations.
//! - [`client`]: request/response correlation and the high-level radio
//!   operations.
//!
//! The stack is single-threaded and strictly synchronous: every request is
//! followed by a blocking read on the same transport, and responses are
//! correlated positionally. Callers that need parallelism use multiple
//! clients over separate transports.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
mod error;
pub mod protocol;
pub mod transport;
pub mod xnl;

pub use client::{ClientConfig, RadioIdentity, VersionTarget, XcmpClient};
pub use error::{Error, Result};
pub use protocol::{Message, MessageType, Opcode, ResultCode};
pub use transport::{ByteTransport, ConnectionKind, PppConfig, PppTransport, SocketTransport};
pub use xnl::{TeaKey, XnlSession};

/// Default XNL port exposed by the radio's internal network interface.
pub const DEFAULT_PORT: u16 = 8002;
