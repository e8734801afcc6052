//! PPP-over-serial bring-up.
//!
//! Some radios expose their network interface behind an internal modem:
//! the transport dials it with AT commands over a serial device, hands the
//! line to an external PPP daemon, scrapes the negotiated remote IP from
//! the daemon's standard output, and from then on delegates to a plain
//! socket transport over the PPP link. OS-specific serial configuration is
//! out of scope; the device is opened as a plain read/write file.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::socket::{ConnectionKind, SocketTransport};
use super::ByteTransport;
use crate::error::{Error, Result};

/// Reset command sent before dialling.
const MODEM_RESET: &str = "ATZ\r";

/// Dial string for the radio's internal modem.
const MODEM_DIAL: &str = "ATDT8002\r";

/// Marker line the PPP daemon prints once the link is negotiated.
const REMOTE_IP_MARKER: &str = "remote IP address";

/// How long to wait for the daemon to report the remote address.
const LINK_TIMEOUT: Duration = Duration::from_secs(30);

fn default_dial_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Configuration for the PPP bring-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PppConfig {
    /// Serial device the radio's modem answers on.
    pub device: PathBuf,
    /// Line rate handed to the PPP daemon.
    pub baud: u32,
    /// Path to the external PPP daemon binary.
    pub pppd_path: PathBuf,
    /// Socket flavour to open over the established link.
    pub kind: ConnectionKind,
    /// Port to connect to on the remote end of the link.
    pub remote_port: u16,
    /// How long each modem command may take.
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout: Duration,
}

impl PppConfig {
    /// Configuration with the default dial timeout.
    pub fn new(
        device: impl Into<PathBuf>,
        baud: u32,
        pppd_path: impl Into<PathBuf>,
        kind: ConnectionKind,
        remote_port: u16,
    ) -> Self {
        Self {
            device: device.into(),
            baud,
            pppd_path: pppd_path.into(),
            kind,
            remote_port,
            dial_timeout: default_dial_timeout(),
        }
    }
}

/// Byte transport over a dialled PPP link.
pub struct PppTransport {
    config: PppConfig,
    daemon: Option<Child>,
    // Held so the daemon's stdout pipe stays open for its lifetime.
    daemon_stdout: Option<BufReader<ChildStdout>>,
    link: Option<SocketTransport>,
}

impl PppTransport {
    /// Create a transport; nothing is dialled until connect.
    #[must_use]
    pub fn new(config: PppConfig) -> Self {
        Self {
            config,
            daemon: None,
            daemon_stdout: None,
            link: None,
        }
    }

    fn run_connect(&mut self) -> Result<()> {
        // Dial first; the device handle must be released before the
        // daemon takes the line over.
        {
            let mut port = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.config.device)?;
            let timeout = self.config.dial_timeout;
            modem_command(&mut port, MODEM_RESET, "OK", timeout)?;
            modem_command(&mut port, MODEM_DIAL, "CONNECT", timeout)?;
        }
        debug!(device = %self.config.device.display(), "modem carrier established");

        let mut daemon = Command::new(&self.config.pppd_path)
            .arg(&self.config.device)
            .arg(self.config.baud.to_string())
            .args(["noauth", "local", "nodetach"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = daemon
            .stdout
            .take()
            .ok_or_else(|| Error::Other("PPP daemon has no stdout".into()))?;
        let mut reader = BufReader::new(stdout);

        let remote = match scrape_remote_ip(&mut reader, LINK_TIMEOUT) {
            Ok(remote) => remote,
            Err(err) => {
                let _ = daemon.kill();
                let _ = daemon.wait();
                return Err(err);
            }
        };
        debug!(%remote, "PPP link up");

        let mut link = SocketTransport::new(
            remote.to_string(),
            self.config.remote_port,
            self.config.kind,
        );
        if let Err(err) = link.connect() {
            let _ = daemon.kill();
            let _ = daemon.wait();
            return Err(err);
        }

        self.daemon = Some(daemon);
        self.daemon_stdout = Some(reader);
        self.link = Some(link);
        Ok(())
    }
}

impl ByteTransport for PppTransport {
    fn connect(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        self.run_connect()
    }

    fn disconnect(&mut self) -> Result<()> {
        if let Some(mut link) = self.link.take() {
            let _ = link.disconnect();
        }
        self.daemon_stdout = None;
        if let Some(mut daemon) = self.daemon.take() {
            if let Err(err) = daemon.kill() {
                warn!(%err, "failed to kill PPP daemon");
            }
            let _ = daemon.wait();
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.link
            .as_mut()
            .ok_or(Error::NotConnected)?
            .send(bytes)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        self.link.as_mut().ok_or(Error::NotConnected)?.receive()
    }

    fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(ByteTransport::is_connected)
    }
}

impl Drop for PppTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

/// Send one AT command and wait for the expected token.
fn modem_command(
    port: &mut (impl Read + Write),
    command: &str,
    expect: &str,
    timeout: Duration,
) -> Result<()> {
    port.write_all(command.as_bytes())?;
    port.flush()?;

    let deadline = Instant::now() + timeout;
    let mut seen = String::new();
    let mut buf = [0u8; 256];
    loop {
        let read = port.read(&mut buf)?;
        if read == 0 {
            return Err(Error::Other(format!(
                "modem closed the line during {}",
                command.trim_end()
            )));
        }
        seen.push_str(&String::from_utf8_lossy(&buf[..read]));
        if seen.contains(expect) {
            return Ok(());
        }
        if seen.contains("ERROR") || seen.contains("NO CARRIER") {
            return Err(Error::Other(format!(
                "modem rejected {}: {}",
                command.trim_end(),
                seen.trim()
            )));
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
    }
}

/// Read daemon output until the remote-IP line appears.
fn scrape_remote_ip(reader: &mut impl BufRead, timeout: Duration) -> Result<Ipv4Addr> {
    let deadline = Instant::now() + timeout;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(Error::Other("PPP daemon exited before the link came up".into()));
        }
        if let Some(remote) = parse_remote_ip(&line) {
            return Ok(remote);
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
    }
}

fn parse_remote_ip(line: &str) -> Option<Ipv4Addr> {
    if !line.contains(REMOTE_IP_MARKER) {
        return None;
    }
    line.split_whitespace().last()?.parse().ok()
}
