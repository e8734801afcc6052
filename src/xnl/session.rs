//! XNL session state machine.
//!
//! The session wraps an inner byte transport and is itself a byte
//! transport: bytes handed to its send travel inside DATA_MSG frames, and
//! its receive hands back DATA_MSG payloads.
//!
//! Connecting walks four states: query the master, request an
//! authentication challenge, answer it with the TEA-encrypted response,
//! and accept the assigned addresses. Any failure along the way is fatal
//! and leaves the session disconnected; a fresh connect starts over.

use bytes::Bytes;
use tracing::{debug, trace};

use super::frame::{XnlFlags, XnlFrame, XnlOpcode, XnlProtocol, HEADER_SIZE};
use super::tea::{encrypt_block, TeaKey, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::protocol::ResultCode;
use crate::transport::ByteTransport;

/// Device type presented in DEVICE_CONN_REQUEST: PC application.
const DEVICE_TYPE_PC: u8 = 0x0A;

/// Authentication level presented in DEVICE_CONN_REQUEST: internal.
const AUTH_LEVEL_INTERNAL: u8 = 0x00;

/// Rollover counters are 3 bits wide.
const ROLLOVER_MODULUS: u8 = 8;

/// Addressing and counters captured once the session is ready.
#[derive(Debug, Clone, Copy)]
struct Established {
    master: u16,
    source: u16,
    logical: u16,
    transaction_base: u8,
    auth_response: [u8; BLOCK_SIZE],
    rollover: u8,
}

#[derive(Debug, Clone, Copy)]
enum SessionState {
    Idle,
    Querying,
    Authenticating {
        master: u16,
    },
    Connecting {
        master: u16,
        source: u16,
        response: [u8; BLOCK_SIZE],
    },
    Ready(Established),
}

/// An XNL session over an inner byte transport.
pub struct XnlSession {
    inner: Box<dyn ByteTransport>,
    key: TeaKey,
    state: SessionState,
    recv_buf: Vec<u8>,
}

impl XnlSession {
    /// Create a session bound to a transport, using the given key material
    /// for the authentication exchange.
    #[must_use]
    pub fn new(inner: Box<dyn ByteTransport>, key: TeaKey) -> Self {
        Self {
            inner,
            key,
            state: SessionState::Idle,
            recv_buf: Vec::new(),
        }
    }

    /// Master address, once discovered.
    #[must_use]
    pub fn master_address(&self) -> Option<u16> {
        match self.state {
            SessionState::Authenticating { master }
            | SessionState::Connecting { master, .. } => Some(master),
            SessionState::Ready(est) => Some(est.master),
            _ => None,
        }
    }

    /// Our assigned source address: temporary after authentication, final
    /// once connected.
    #[must_use]
    pub fn source_address(&self) -> Option<u16> {
        match self.state {
            SessionState::Connecting { source, .. } => Some(source),
            SessionState::Ready(est) => Some(est.source),
            _ => None,
        }
    }

    /// Our logical address, once connected.
    #[must_use]
    pub fn logical_address(&self) -> Option<u16> {
        match self.state {
            SessionState::Ready(est) => Some(est.logical),
            _ => None,
        }
    }

    /// Encrypted response computed from the peer's challenge.
    #[must_use]
    pub fn auth_response(&self) -> Option<[u8; BLOCK_SIZE]> {
        match self.state {
            SessionState::Connecting { response, .. } => Some(response),
            SessionState::Ready(est) => Some(est.auth_response),
            _ => None,
        }
    }

    /// Accumulate inner reads until one whole XNL frame is buffered, then
    /// decode exactly that frame. Coalesced frames stay buffered for the
    /// next call.
    fn read_frame(&mut self) -> Result<XnlFrame> {
        loop {
            if self.recv_buf.len() >= HEADER_SIZE {
                let declared =
                    u16::from_be_bytes([self.recv_buf[10], self.recv_buf[11]]) as usize;
                let total = HEADER_SIZE + declared;
                if self.recv_buf.len() >= total {
                    let frame_bytes: Vec<u8> = self.recv_buf.drain(..total).collect();
                    return XnlFrame::decode(&frame_bytes);
                }
            }
            let chunk = self.inner.receive()?;
            self.recv_buf.extend_from_slice(&chunk);
        }
    }

    fn expect_frame(&mut self, opcode: XnlOpcode) -> Result<XnlFrame> {
        let frame = self.read_frame()?;
        if frame.opcode != opcode {
            return Err(Error::Session(format!(
                "expected XNL opcode {opcode}, got {}",
                frame.opcode
            )));
        }
        Ok(frame)
    }

    fn run_connect(&mut self) -> Result<()> {
        self.inner.connect()?;

        // Master discovery: all address fields zero, answered by the
        // master's own broadcast.
        self.state = SessionState::Querying;
        let query = XnlFrame::control(XnlOpcode::DEVICE_MASTER_QUERY, 0, 0, Bytes::new());
        self.inner.send(&query.encode())?;
        let status = self.expect_frame(XnlOpcode::MASTER_STATUS_BROADCAST)?;
        let master = status.source;
        debug!(master, "XNL master discovered");

        // Challenge request. The reply carries our temporary address and
        // the 8-byte challenge plaintext.
        self.state = SessionState::Authenticating { master };
        let request = XnlFrame::control(XnlOpcode::DEVICE_AUTH_KEY_REQUEST, master, 0, Bytes::new());
        self.inner.send(&request.encode())?;
        let reply = self.expect_frame(XnlOpcode::DEVICE_AUTH_KEY_REPLY)?;
        if reply.payload.len() < 2 + BLOCK_SIZE {
            return Err(Error::BufferTooSmall {
                needed: 2 + BLOCK_SIZE,
                got: reply.payload.len(),
            });
        }
        let source = u16::from_be_bytes([reply.payload[0], reply.payload[1]]);
        let mut challenge = [0u8; BLOCK_SIZE];
        challenge.copy_from_slice(&reply.payload[2..2 + BLOCK_SIZE]);
        let response = encrypt_block(&self.key, challenge);
        trace!(source, "challenge received, temporary address assigned");

        // Connection request: reserved(2), device type, auth level, then
        // the encrypted response.
        self.state = SessionState::Connecting {
            master,
            source,
            response,
        };
        let mut payload = Vec::with_capacity(4 + BLOCK_SIZE);
        payload.extend_from_slice(&[0x00, 0x00, DEVICE_TYPE_PC, AUTH_LEVEL_INTERNAL]);
        payload.extend_from_slice(&response);
        let conn = XnlFrame::control(XnlOpcode::DEVICE_CONN_REQUEST, master, source, payload);
        self.inner.send(&conn.encode())?;

        let reply = self.expect_frame(XnlOpcode::DEVICE_CONN_REPLY)?;
        if reply.payload.len() < 6 {
            return Err(Error::BufferTooSmall {
                needed: 6,
                got: reply.payload.len(),
            });
        }
        let result = ResultCode::from_u8(reply.payload[0]);
        if !result.is_success() {
            return Err(Error::AuthFailure(result));
        }
        let transaction_base = reply.payload[1];
        let source = u16::from_be_bytes([reply.payload[2], reply.payload[3]]);
        let logical = u16::from_be_bytes([reply.payload[4], reply.payload[5]]);

        self.state = SessionState::Ready(Established {
            master,
            source,
            logical,
            transaction_base,
            auth_response: response,
            rollover: 0,
        });
        debug!(master, source, logical, "XNL session ready");
        Ok(())
    }
}

impl ByteTransport for XnlSession {
    /// Bring up the inner transport and walk the session state machine.
    ///
    /// Errors are fatal: the inner transport is released and the session
    /// returns to idle, requiring a fresh connect to recover.
    fn connect(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Ready(_)) {
            return Ok(());
        }
        self.run_connect().map_err(|err| {
            self.state = SessionState::Idle;
            self.recv_buf.clear();
            let _ = self.inner.disconnect();
            err
        })
    }

    fn disconnect(&mut self) -> Result<()> {
        self.state = SessionState::Idle;
        self.recv_buf.clear();
        self.inner.disconnect()
    }

    /// Wrap `data` in a DATA_MSG and wait for its DATA_MSG_ACK.
    ///
    /// The ACK must echo the rollover counter and the transaction id
    /// exactly; only then does the rollover advance (modulo 8). An
    /// out-of-order ACK fails the call rather than being re-queued,
    /// matching the fielded peer's discipline.
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let SessionState::Ready(est) = self.state else {
            return Err(Error::NotConnected);
        };

        let transaction_id =
            (u16::from(est.transaction_base) << 8) | u16::from(rand::random::<u8>());
        let frame = XnlFrame {
            opcode: XnlOpcode::DATA_MSG,
            protocol: XnlProtocol::Xcmp,
            flags: XnlFlags::new(est.rollover, true),
            dest: est.master,
            source: est.source,
            transaction_id,
            payload: Bytes::copy_from_slice(data),
        };
        trace!(transaction_id, rollover = est.rollover, "sending DATA_MSG");
        self.inner.send(&frame.encode())?;

        let ack = self.read_frame()?;
        if ack.opcode != XnlOpcode::DATA_MSG_ACK {
            return Err(Error::Session(format!(
                "expected DATA_MSG_ACK, got opcode {}",
                ack.opcode
            )));
        }
        if ack.transaction_id != transaction_id || ack.flags.rollover() != est.rollover {
            return Err(Error::AckMismatch {
                sent_transaction: transaction_id,
                acked_transaction: ack.transaction_id,
                sent_rollover: est.rollover,
                acked_rollover: ack.flags.rollover(),
            });
        }

        if let SessionState::Ready(est) = &mut self.state {
            est.rollover = (est.rollover + 1) % ROLLOVER_MODULUS;
        }
        Ok(())
    }

    /// Read one XCMP payload from the session.
    ///
    /// Control frames that arrive in between are logged and skipped. A
    /// DATA_MSG that asks for an ACK is acknowledged before its payload is
    /// returned.
    fn receive(&mut self) -> Result<Vec<u8>> {
        let SessionState::Ready(est) = self.state else {
            return Err(Error::NotConnected);
        };

        loop {
            let frame = self.read_frame()?;
            if frame.protocol != XnlProtocol::Xcmp {
                debug!(opcode = %frame.opcode, "skipping non-XCMP frame");
                continue;
            }
            if frame.opcode == XnlOpcode::DATA_MSG && frame.flags.ack_needed() {
                let ack = XnlFrame {
                    opcode: XnlOpcode::DATA_MSG_ACK,
                    protocol: XnlProtocol::Xcmp,
                    flags: XnlFlags::new(frame.flags.rollover(), false),
                    dest: frame.source,
                    source: est.source,
                    transaction_id: frame.transaction_id,
                    payload: Bytes::new(),
                };
                self.inner.send(&ack.encode())?;
            }
            return Ok(frame.payload.to_vec());
        }
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Ready(_)) && self.inner.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    type ReplyFn = Box<dyn FnMut(&[Vec<u8>]) -> Vec<u8>>;

    /// Scripted transport: records everything sent and answers each
    /// receive from a queue of reply builders that can inspect the log.
    struct ScriptedTransport {
        sent: Rc<RefCell<Vec<Vec<u8>>>>,
        replies: Rc<RefCell<VecDeque<ReplyFn>>>,
        connected: bool,
    }

    impl ScriptedTransport {
        fn new() -> (Self, Rc<RefCell<Vec<Vec<u8>>>>, Rc<RefCell<VecDeque<ReplyFn>>>) {
            let sent = Rc::new(RefCell::new(Vec::new()));
            let replies = Rc::new(RefCell::new(VecDeque::new()));
            let transport = Self {
                sent: Rc::clone(&sent),
                replies: Rc::clone(&replies),
                connected: false,
            };
            (transport, sent, replies)
        }
    }

    impl ByteTransport for ScriptedTransport {
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }

        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.borrow_mut().push(bytes.to_vec());
            Ok(())
        }

        fn receive(&mut self) -> Result<Vec<u8>> {
            let mut reply = self
                .replies
                .borrow_mut()
                .pop_front()
                .ok_or(Error::Timeout)?;
            Ok(reply(&self.sent.borrow()))
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    const MASTER: u16 = 0x0006;
    const TEMP_SOURCE: u16 = 0x000E;
    const FINAL_SOURCE: u16 = 0x0070;
    const LOGICAL: u16 = 0x0051;
    const BASE: u8 = 0x3C;
    const CHALLENGE: [u8; 8] = [0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18];

    fn test_key() -> TeaKey {
        TeaKey::new(
            [0x1A2B_3C4D, 0x5E6F_7081, 0x92A3_B4C5, 0xD6E7_F809],
            0x9E37_79B9,
        )
    }

    fn fixed(frame: XnlFrame) -> ReplyFn {
        let bytes = frame.encode();
        Box::new(move |_| bytes.clone())
    }

    fn master_broadcast() -> XnlFrame {
        XnlFrame::control(XnlOpcode::MASTER_STATUS_BROADCAST, 0, MASTER, Bytes::new())
    }

    fn auth_reply() -> XnlFrame {
        let mut payload = TEMP_SOURCE.to_be_bytes().to_vec();
        payload.extend_from_slice(&CHALLENGE);
        XnlFrame::control(XnlOpcode::DEVICE_AUTH_KEY_REPLY, 0, MASTER, payload)
    }

    fn conn_reply(result: u8) -> XnlFrame {
        let mut payload = vec![result, BASE];
        payload.extend_from_slice(&FINAL_SOURCE.to_be_bytes());
        payload.extend_from_slice(&LOGICAL.to_be_bytes());
        payload.extend_from_slice(&[0u8; 8]);
        XnlFrame::control(XnlOpcode::DEVICE_CONN_REPLY, TEMP_SOURCE, MASTER, payload)
    }

    /// Build an ACK echoing the last DATA_MSG in the sent log.
    fn ack_last_data_msg() -> ReplyFn {
        Box::new(|sent| {
            let data_msg = XnlFrame::decode(sent.last().unwrap()).unwrap();
            XnlFrame {
                opcode: XnlOpcode::DATA_MSG_ACK,
                protocol: XnlProtocol::Xcmp,
                flags: XnlFlags::new(data_msg.flags.rollover(), false),
                dest: data_msg.source,
                source: data_msg.dest,
                transaction_id: data_msg.transaction_id,
                payload: Bytes::new(),
            }
            .encode()
        })
    }

    fn connected_session() -> (XnlSession, Rc<RefCell<Vec<Vec<u8>>>>, Rc<RefCell<VecDeque<ReplyFn>>>) {
        let (transport, sent, replies) = ScriptedTransport::new();
        {
            let mut queue = replies.borrow_mut();
            queue.push_back(fixed(master_broadcast()));
            queue.push_back(fixed(auth_reply()));
            queue.push_back(fixed(conn_reply(0x00)));
        }
        let mut session = XnlSession::new(Box::new(transport), test_key());
        session.connect().expect("connect");
        (session, sent, replies)
    }

    #[test]
    fn test_connect_captures_addresses() {
        let (session, sent, _) = connected_session();
        assert!(session.is_connected());
        assert_eq!(session.master_address(), Some(MASTER));
        assert_eq!(session.source_address(), Some(FINAL_SOURCE));
        assert_eq!(session.logical_address(), Some(LOGICAL));

        // Master query goes out with every address field zero.
        let query = XnlFrame::decode(&sent.borrow()[0]).unwrap();
        assert_eq!(query.opcode, XnlOpcode::DEVICE_MASTER_QUERY);
        assert_eq!((query.dest, query.source), (0, 0));
    }

    #[test]
    fn test_conn_request_carries_encrypted_challenge() {
        let (session, sent, _) = connected_session();
        let conn = XnlFrame::decode(&sent.borrow()[2]).unwrap();
        assert_eq!(conn.opcode, XnlOpcode::DEVICE_CONN_REQUEST);
        assert_eq!(conn.source, TEMP_SOURCE);
        assert_eq!(conn.payload.len(), 12);
        assert_eq!(&conn.payload[..4], &[0x00, 0x00, 0x0A, 0x00]);

        let expected = encrypt_block(&test_key(), CHALLENGE);
        assert_eq!(&conn.payload[4..], &expected[..]);
        assert_eq!(session.auth_response(), Some(expected));
    }

    #[test]
    fn test_auth_rejection_is_fatal() {
        let (transport, _, replies) = ScriptedTransport::new();
        {
            let mut queue = replies.borrow_mut();
            queue.push_back(fixed(master_broadcast()));
            queue.push_back(fixed(auth_reply()));
            queue.push_back(fixed(conn_reply(0x01)));
        }
        let mut session = XnlSession::new(Box::new(transport), test_key());
        let err = session.connect().expect_err("auth should fail");
        assert!(matches!(err, Error::AuthFailure(ResultCode::Failure)));
        assert!(!session.is_connected());
        assert!(matches!(session.send(&[0x00]), Err(Error::NotConnected)));
    }

    #[test]
    fn test_send_advances_rollover_on_matching_ack() {
        let (mut session, sent, replies) = connected_session();
        for expected_rollover in 0..10u8 {
            replies.borrow_mut().push_back(ack_last_data_msg());
            session.send(&[0x00, 0x02, 0x00, 0x00]).expect("send");
            let data_msg = XnlFrame::decode(sent.borrow().last().unwrap()).unwrap();
            assert_eq!(data_msg.opcode, XnlOpcode::DATA_MSG);
            assert_eq!(data_msg.flags.rollover(), expected_rollover % 8);
            assert!(data_msg.flags.ack_needed());
            assert_eq!(data_msg.transaction_id >> 8, u16::from(BASE));
        }
    }

    #[test]
    fn test_mismatched_ack_rejected() {
        let (mut session, _, replies) = connected_session();
        replies.borrow_mut().push_back(Box::new(|sent: &[Vec<u8>]| {
            let data_msg = XnlFrame::decode(sent.last().unwrap()).unwrap();
            XnlFrame {
                opcode: XnlOpcode::DATA_MSG_ACK,
                protocol: XnlProtocol::Xcmp,
                flags: XnlFlags::new(data_msg.flags.rollover(), false),
                dest: data_msg.source,
                source: data_msg.dest,
                transaction_id: data_msg.transaction_id ^ 0x0001,
                payload: Bytes::new(),
            }
            .encode()
        }));
        let err = session.send(&[0x00]).expect_err("ack must not match");
        assert!(matches!(err, Error::AckMismatch { .. }));
    }

    #[test]
    fn test_receive_unwraps_and_acks_data_msg() {
        let (mut session, sent, replies) = connected_session();
        let inbound = XnlFrame {
            opcode: XnlOpcode::DATA_MSG,
            protocol: XnlProtocol::Xcmp,
            flags: XnlFlags::new(3, true),
            dest: FINAL_SOURCE,
            source: MASTER,
            transaction_id: 0x3C77,
            payload: Bytes::from_static(&[0x00, 0x03, 0x80, 0x00, 0x00]),
        };
        replies.borrow_mut().push_back(fixed(inbound));

        let payload = session.receive().expect("receive");
        assert_eq!(payload, [0x00, 0x03, 0x80, 0x00, 0x00]);

        let ack = XnlFrame::decode(sent.borrow().last().unwrap()).unwrap();
        assert_eq!(ack.opcode, XnlOpcode::DATA_MSG_ACK);
        assert_eq!(ack.transaction_id, 0x3C77);
        assert_eq!(ack.flags.rollover(), 3);
        assert_eq!(ack.dest, MASTER);
        assert_eq!(ack.source, FINAL_SOURCE);
    }

    #[test]
    fn test_coalesced_frames_split() {
        let (mut session, _, replies) = connected_session();
        // Two frames delivered in a single read.
        let first = XnlFrame {
            opcode: XnlOpcode::DATA_MSG,
            protocol: XnlProtocol::Xcmp,
            flags: XnlFlags::new(0, false),
            dest: FINAL_SOURCE,
            source: MASTER,
            transaction_id: 1,
            payload: Bytes::from_static(&[0xAA]),
        };
        let second = XnlFrame {
            payload: Bytes::from_static(&[0xBB]),
            transaction_id: 2,
            ..first.clone()
        };
        let mut combined = first.encode();
        combined.extend_from_slice(&second.encode());
        replies.borrow_mut().push_back(Box::new(move |_| combined.clone()));

        assert_eq!(session.receive().unwrap(), [0xAA]);
        assert_eq!(session.receive().unwrap(), [0xBB]);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (mut session, _, _) = connected_session();
        session.disconnect().expect("first disconnect");
        session.disconnect().expect("second disconnect");
        assert!(!session.is_connected());
    }
}
