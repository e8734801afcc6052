//! Scripted transport shared by the integration tests.
//!
//! Sends are recorded; each receive is answered by the next reply builder
//! in the queue, which may inspect the send log (to echo a transaction id,
//! for instance). An exhausted queue behaves like a receive timeout.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use xcmp::{ByteTransport, Error, Result};

pub type SentLog = Rc<RefCell<Vec<Vec<u8>>>>;
pub type ReplyFn = Box<dyn FnMut(&[Vec<u8>]) -> Vec<u8>>;
pub type ReplyQueue = Rc<RefCell<VecDeque<ReplyFn>>>;

pub struct ScriptedTransport {
    sent: SentLog,
    replies: ReplyQueue,
    connected: bool,
}

impl ScriptedTransport {
    pub fn new() -> (Self, SentLog, ReplyQueue) {
        let sent: SentLog = Rc::new(RefCell::new(Vec::new()));
        let replies: ReplyQueue = Rc::new(RefCell::new(VecDeque::new()));
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

/// Reply builder that returns the same bytes regardless of the log.
pub fn fixed(bytes: Vec<u8>) -> ReplyFn {
    Box::new(move |_| bytes.clone())
}

/// Queue a sequence of fixed replies.
pub fn push_fixed(queue: &ReplyQueue, frames: impl IntoIterator<Item = Vec<u8>>) {
    let mut queue = queue.borrow_mut();
    for frame in frames {
        queue.push_back(fixed(frame));
    }
}
