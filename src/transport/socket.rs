//! TCP/UDP socket transport.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ByteTransport;
use crate::error::{Error, Result};

/// Default receive timeout.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Receive buffer size; comfortably above the largest XCMP frame.
const RECV_BUFFER: usize = 2048;

/// Which socket flavour to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Connected TCP stream.
    Tcp,
    /// Bind-then-connect UDP socket.
    Udp,
}

enum SocketState {
    Disconnected,
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// A blocking socket to a fixed host and port.
pub struct SocketTransport {
    host: String,
    port: u16,
    kind: ConnectionKind,
    timeout: Duration,
    state: SocketState,
}

impl SocketTransport {
    /// Create a transport for the given endpoint. Nothing is opened until
    /// [`ByteTransport::connect`].
    pub fn new(host: impl Into<String>, port: u16, kind: ConnectionKind) -> Self {
        Self {
            host: host.into(),
            port,
            kind,
            timeout: RECEIVE_TIMEOUT,
            state: SocketState::Disconnected,
        }
    }

    /// Override the receive timeout before connecting.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl ByteTransport for SocketTransport {
    fn connect(&mut self) -> Result<()> {
        match self.kind {
            ConnectionKind::Tcp => {
                let stream = TcpStream::connect(self.addr())?;
                stream.set_read_timeout(Some(self.timeout))?;
                stream.set_nodelay(true)?;
                debug!(host = %self.host, port = self.port, "TCP transport connected");
                self.state = SocketState::Tcp(stream);
            }
            ConnectionKind::Udp => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                socket.connect(self.addr())?;
                socket.set_read_timeout(Some(self.timeout))?;
                debug!(host = %self.host, port = self.port, "UDP transport connected");
                self.state = SocketState::Udp(socket);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if let SocketState::Tcp(stream) = &self.state {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.state = SocketState::Disconnected;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.state {
            SocketState::Tcp(stream) => {
                stream.write_all(bytes)?;
                Ok(())
            }
            SocketState::Udp(socket) => {
                socket.send(bytes)?;
                Ok(())
            }
            SocketState::Disconnected => Err(Error::NotConnected),
        }
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; RECV_BUFFER];
        let read = match &mut self.state {
            SocketState::Tcp(stream) => match stream.read(&mut buf) {
                Ok(0) => {
                    return Err(Error::Transport(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )));
                }
                Ok(read) => read,
                Err(err) => return Err(map_receive_error(err)),
            },
            SocketState::Udp(socket) => match socket.recv(&mut buf) {
                Ok(read) => read,
                Err(err) => return Err(map_receive_error(err)),
            },
            SocketState::Disconnected => return Err(Error::NotConnected),
        };
        Ok(buf[..read].to_vec())
    }

    fn is_connected(&self) -> bool {
        !matches!(self.state, SocketState::Disconnected)
    }
}

/// A timed-out read is a protocol-visible condition, not an I/O fault.
fn map_receive_error(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
        _ => Error::Transport(err),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn test_disconnected_socket_rejects_io() {
        let mut transport = SocketTransport::new("127.0.0.1", 1, ConnectionKind::Tcp);
        assert!(!transport.is_connected());
        assert!(matches!(transport.send(&[0]), Err(Error::NotConnected)));
        assert!(matches!(transport.receive(), Err(Error::NotConnected)));
        transport.disconnect().expect("disconnect is idempotent");
    }

    #[test]
    fn test_tcp_roundtrip_and_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            peer.read_exact(&mut buf).unwrap();
            peer.write_all(&buf).unwrap();
            // Hold the socket open so the client's next read times out
            // rather than seeing EOF.
            thread::sleep(Duration::from_millis(300));
        });

        let mut transport = SocketTransport::new("127.0.0.1", addr.port(), ConnectionKind::Tcp)
            .with_timeout(Duration::from_millis(100));
        transport.connect().unwrap();
        assert!(transport.is_connected());

        transport.send(&[0x00, 0x02, 0x00, 0x00]).unwrap();
        let echoed = transport.receive().unwrap();
        assert_eq!(echoed, [0x00, 0x02, 0x00, 0x00]);

        assert!(matches!(transport.receive(), Err(Error::Timeout)));

        transport.disconnect().unwrap();
        transport.disconnect().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_udp_roundtrip() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let echo = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (read, peer) = server.recv_from(&mut buf).unwrap();
            server.send_to(&buf[..read], peer).unwrap();
        });

        let mut transport = SocketTransport::new("127.0.0.1", addr.port(), ConnectionKind::Udp);
        transport.connect().unwrap();
        transport.send(&[0xAB, 0xCD]).unwrap();
        assert_eq!(transport.receive().unwrap(), [0xAB, 0xCD]);
        echo.join().unwrap();
    }
}
