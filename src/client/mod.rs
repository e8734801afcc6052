//! XCMP client: request/response correlation over a byte transport.
//!
//! The client owns its transport exclusively, either a raw socket or an
//! XNL session, and runs one strictly synchronous exchange at a time.
//! Responses are matched to requests positionally: the next frame read is
//! the response to the last request sent.

mod ops;

pub use ops::{
    bytes_to_frequency, frequency_to_bytes, BerMode, BerReportEntry, SoftpotParams, SyncStatus,
    TestPattern, VersionTarget,
};

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{self, Message, MessageType, Opcode, Softpot, LENGTH_PREFIX_SIZE};
use crate::transport::ByteTransport;

fn default_reply_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_identity() -> bool {
    true
}

/// Client behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Read the radio's identity (serial, model, versions) on connect.
    #[serde(default = "default_probe_identity")]
    pub probe_identity: bool,
    /// Overall wait applied by [`XcmpClient::send_bytes`].
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            probe_identity: true,
            reply_timeout: default_reply_timeout(),
        }
    }
}

/// Identity read from the radio during connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioIdentity {
    /// Serial number.
    pub serial: Option<String>,
    /// Model number.
    pub model: Option<String>,
    /// Host software version.
    pub host_version: Option<String>,
    /// DSP software version.
    pub dsp_version: Option<String>,
}

/// An XCMP client bound to one transport.
pub struct XcmpClient {
    transport: Box<dyn ByteTransport>,
    config: ClientConfig,
    connected: bool,
    recv_buf: Vec<u8>,
    identity: RadioIdentity,
}

impl XcmpClient {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new(transport: Box<dyn ByteTransport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client with explicit configuration.
    #[must_use]
    pub fn with_config(transport: Box<dyn ByteTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            connected: false,
            recv_buf: Vec::new(),
            identity: RadioIdentity::default(),
        }
    }

    /// Bring the transport up and, unless disabled, read the radio's
    /// identity.
    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect()?;
        self.connected = true;
        if self.config.probe_identity {
            if let Err(err) = self.probe_identity() {
                let _ = self.disconnect();
                return Err(err);
            }
        }
        Ok(())
    }

    fn probe_identity(&mut self) -> Result<()> {
        let serial = self.get_serial()?;
        let model = self.get_model()?;
        let host_version = self.get_version(VersionTarget::HostSoftware)?;
        let dsp_version = self.get_version(VersionTarget::DspSoftware)?;
        self.identity = RadioIdentity {
            serial: Some(serial),
            model: Some(model),
            host_version: Some(host_version),
            dsp_version: Some(dsp_version),
        };
        Ok(())
    }

    /// Tear the transport down. Safe to call repeatedly.
    pub fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.recv_buf.clear();
        self.transport.disconnect()
    }

    /// Whether the client and its transport are connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected && self.transport.is_connected()
    }

    /// Identity captured during connect.
    #[must_use]
    pub fn identity(&self) -> &RadioIdentity {
        &self.identity
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Accumulate transport reads until one whole length-prefixed frame is
    /// buffered, then hand it over. Extra bytes stay buffered.
    fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            if self.recv_buf.len() >= LENGTH_PREFIX_SIZE {
                let declared =
                    u16::from_be_bytes([self.recv_buf[0], self.recv_buf[1]]) as usize;
                let total = LENGTH_PREFIX_SIZE + declared;
                if self.recv_buf.len() >= total {
                    return Ok(self.recv_buf.drain(..total).collect());
                }
            }
            let chunk = self.transport.receive()?;
            self.recv_buf.extend_from_slice(&chunk);
        }
    }

    /// Send a request and read its response.
    ///
    /// The reply must be a response, echo the request opcode, and report
    /// success; any violation fails with the matching error kind.
    pub fn send(&mut self, message: &Message) -> Result<Message> {
        self.send_expecting(message, MessageType::Response)
    }

    /// Send a message and read one reply of the given type.
    pub fn send_expecting(&mut self, message: &Message, expected: MessageType) -> Result<Message> {
        self.ensure_connected()?;
        self.transport.send(&message.encode())?;

        let frame = self.read_frame()?;
        let reply = protocol::decode(&frame)?;

        if reply.message_type() != expected {
            return Err(Error::UnexpectedReplyType {
                expected,
                got: reply.message_type(),
            });
        }
        if reply.opcode() != message.opcode() {
            return Err(Error::OpcodeMismatch {
                request: message.opcode(),
                reply: reply.opcode(),
            });
        }
        if let Some(result) = reply.result() {
            if !result.is_success() {
                return Err(Error::ResultFailure(result));
            }
        }
        Ok(reply)
    }

    /// Fire-and-forget: send without reading anything back.
    pub fn write(&mut self, message: &Message) -> Result<()> {
        self.ensure_connected()?;
        self.transport.send(&message.encode())
    }

    /// Raw opcode-first byte exchange.
    ///
    /// Frames the raw bytes with a length prefix, sends them, and scans
    /// incoming frames until one opens with the request opcode plus the
    /// reply-marker offset. Non-matching frames are discarded; the scan
    /// gives up after the configured reply timeout.
    pub fn send_bytes(&mut self, raw: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        if raw.len() < 2 {
            return Err(Error::BufferTooSmall {
                needed: 2,
                got: raw.len(),
            });
        }

        let marker = u16::from_be_bytes([raw[0], raw[1]])
            .wrapping_add(protocol::REPLY_MARKER_OFFSET);
        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + raw.len());
        frame.extend_from_slice(&(raw.len() as u16).to_be_bytes());
        frame.extend_from_slice(raw);
        self.transport.send(&frame)?;

        let deadline = Instant::now() + self.config.reply_timeout;
        loop {
            match self.read_frame() {
                Ok(reply) => {
                    if reply.len() >= 4
                        && u16::from_be_bytes([reply[2], reply[3]]) == marker
                    {
                        return Ok(reply[LENGTH_PREFIX_SIZE..].to_vec());
                    }
                    trace!(len = reply.len(), "discarding frame without reply marker");
                }
                Err(Error::Timeout) => {}
                Err(err) => return Err(err),
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
    }

    /// Send a softpot request and verify the reply echoes its type.
    pub fn send_softpot(&mut self, softpot: &Softpot) -> Result<Softpot> {
        let request = Message::request(Opcode::SOFTPOT, softpot.encode()?);
        let reply = self.send(&request)?;
        let parsed = Softpot::decode(reply.payload())?;
        if parsed.softpot != softpot.softpot {
            return Err(Error::SoftpotMismatch {
                request: softpot.softpot,
                reply: parsed.softpot,
            });
        }
        Ok(parsed)
    }
}
