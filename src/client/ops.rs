//! High-level radio operations.
//!
//! Each wrapper builds the right typed message, runs it through the
//! client's exchange discipline, and interprets the payload.

use std::thread;
use std::time::Duration;

use bytes::Bytes;

use super::XcmpClient;
use crate::error::{Error, Result};
use crate::protocol::{
    DisplayContent, DisplayId, DisplayRegion, DisplayText, DisplayTimer, Message, Opcode, Softpot,
    SoftpotType, TextEncoding,
};

/// Bits in one P25 frame, the unit of bit-error-rate accounting.
pub const P25_FRAME_BITS: u64 = 3456;

/// Measurement time budgeted per requested BER frame.
const BER_FRAME_TIME: Duration = Duration::from_millis(800);

/// Size of one BER report group on the wire.
const BER_GROUP_LEN: usize = 5;

/// Which version string to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VersionTarget {
    /// Host processor software.
    HostSoftware = 0x00,
    /// DSP software.
    DspSoftware = 0x01,
}

impl VersionTarget {
    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Test patterns the receive chain can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TestPattern {
    /// Standard P25 1011 Hz test pattern.
    P25 = 0x01,
}

impl TestPattern {
    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// BER measurement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BerMode {
    /// Measure a single frame.
    Single = 0x00,
    /// Keep measuring until read out.
    Continuous = 0x01,
}

impl BerMode {
    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Receiver sync state reported per BER frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Frame received in sync; its error count is valid.
    InSync,
    /// Sync never acquired.
    NoSync,
    /// Sync acquired, then lost.
    Lost,
    /// Status byte outside the enumerated set.
    Other(u8),
}

impl SyncStatus {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::InSync,
            0x01 => Self::NoSync,
            0x02 => Self::Lost,
            other => Self::Other(other),
        }
    }

    /// Whether this frame's error count participates in the BER.
    #[must_use]
    pub const fn is_counted(self) -> bool {
        !matches!(self, Self::NoSync | Self::Lost)
    }
}

/// One 5-byte group from a BER sync report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerReportEntry {
    /// Frame number.
    pub frame: u8,
    /// Receiver sync state for the frame.
    pub sync: SyncStatus,
    /// 24-bit bit-error count.
    pub bit_errors: u32,
}

/// Softpot value plus its calibrated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftpotParams {
    /// Current value.
    pub current: u32,
    /// Calibrated minimum.
    pub min: u32,
    /// Calibrated maximum.
    pub max: u32,
}

/// Serialise a frequency in Hz as the on-wire 32-bit value in 5 Hz units.
pub fn frequency_to_bytes(hz: u64) -> Result<[u8; 4]> {
    if hz % 5 != 0 {
        return Err(Error::Other(format!(
            "frequency {hz} Hz is not a multiple of 5"
        )));
    }
    let units = u32::try_from(hz / 5)
        .map_err(|_| Error::Other(format!("frequency {hz} Hz out of range")))?;
    Ok(units.to_be_bytes())
}

/// Invert [`frequency_to_bytes`].
#[must_use]
pub fn bytes_to_frequency(bytes: &[u8; 4]) -> u64 {
    u64::from(u32::from_be_bytes(*bytes)) * 5
}

/// Strings in identity replies are Latin-1 with NUL padding.
fn decode_string_payload(payload: &[u8]) -> String {
    payload
        .iter()
        .copied()
        .take_while(|&b| b != 0)
        .map(char::from)
        .collect()
}

fn parse_ber_report(payload: &[u8]) -> Result<Vec<BerReportEntry>> {
    if payload.len() % BER_GROUP_LEN != 0 {
        return Err(Error::Other(format!(
            "BER report length {} is not a multiple of {BER_GROUP_LEN}",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(BER_GROUP_LEN)
        .map(|group| BerReportEntry {
            frame: group[0],
            sync: SyncStatus::from_u8(group[1]),
            bit_errors: u32::from_be_bytes([0, group[2], group[3], group[4]]),
        })
        .collect())
}

impl XcmpClient {
    /// Check the radio is alive.
    pub fn ping(&mut self) -> Result<bool> {
        self.send(&Message::request(Opcode::PING, Bytes::new()))?;
        Ok(true)
    }

    /// Read the serial number.
    pub fn get_serial(&mut self) -> Result<String> {
        let reply = self.send(&Message::request(Opcode::SERIAL_NUMBER, Bytes::new()))?;
        Ok(decode_string_payload(reply.payload()))
    }

    /// Read the model number.
    pub fn get_model(&mut self) -> Result<String> {
        let reply = self.send(&Message::request(Opcode::MODEL_NUMBER, Bytes::new()))?;
        Ok(decode_string_payload(reply.payload()))
    }

    /// Read one of the radio's version strings.
    pub fn get_version(&mut self, target: VersionTarget) -> Result<String> {
        let reply = self.send(&Message::request(
            Opcode::VERSION_INFO,
            vec![target.as_u8()],
        ))?;
        Ok(decode_string_payload(reply.payload()))
    }

    /// Program the receive chain frequency, in Hz.
    pub fn set_rx_frequency(&mut self, hz: u64) -> Result<()> {
        let payload = frequency_to_bytes(hz)?;
        self.send(&Message::request(Opcode::RX_FREQUENCY, payload.to_vec()))?;
        Ok(())
    }

    /// Program the transmit chain frequency, in Hz.
    pub fn set_tx_frequency(&mut self, hz: u64) -> Result<()> {
        let payload = frequency_to_bytes(hz)?;
        self.send(&Message::request(Opcode::TX_FREQUENCY, payload.to_vec()))?;
        Ok(())
    }

    /// Key the transmitter.
    pub fn keyup(&mut self) -> Result<()> {
        self.send(&Message::request(Opcode::TX_CONTROL, vec![0x01]))?;
        Ok(())
    }

    /// Dekey the transmitter.
    pub fn dekey(&mut self) -> Result<()> {
        self.send(&Message::request(Opcode::TX_CONTROL, vec![0x00]))?;
        Ok(())
    }

    /// Read a softpot's current value.
    pub fn softpot_read(&mut self, softpot: SoftpotType) -> Result<u32> {
        let reply = self.send_softpot(&Softpot::read(softpot))?;
        reply.value().ok_or(Error::BufferTooSmall {
            needed: softpot.value_width(),
            got: 0,
        })
    }

    /// Write and persist a softpot value.
    pub fn softpot_write(&mut self, softpot: SoftpotType, value: u32) -> Result<()> {
        self.send_softpot(&Softpot::write(softpot, value))?;
        Ok(())
    }

    /// Read a softpot's current value together with its calibrated range.
    pub fn softpot_params(&mut self, softpot: SoftpotType) -> Result<SoftpotParams> {
        let missing = |got: usize| Error::BufferTooSmall {
            needed: softpot.value_width(),
            got,
        };
        let current = self
            .send_softpot(&Softpot::read(softpot))?
            .value()
            .ok_or(missing(0))?;
        let min = self
            .send_softpot(&Softpot::read_min(softpot))?
            .value()
            .ok_or(missing(0))?;
        let max = self
            .send_softpot(&Softpot::read_max(softpot))?
            .value()
            .ok_or(missing(0))?;
        Ok(SoftpotParams { current, min, max })
    }

    /// Write text into a display region.
    pub fn display_update(&mut self, content: DisplayContent) -> Result<()> {
        let payload = DisplayText::Update(content).encode()?;
        self.send(&Message::request(Opcode::DISPLAY_TEXT, payload))?;
        Ok(())
    }

    /// Read back what a display region currently shows.
    pub fn display_query(
        &mut self,
        token: u8,
        region: DisplayRegion,
        id: DisplayId,
    ) -> Result<DisplayContent> {
        let query = DisplayText::Query(DisplayContent {
            token,
            region,
            id,
            timer: DisplayTimer::PERMANENT,
            message_class: 1,
            encoding: TextEncoding::Iso8859_1,
            text: String::new(),
        });
        let reply = self.send(&Message::request(Opcode::DISPLAY_TEXT, query.encode()?))?;
        match DisplayText::decode(reply.payload())? {
            DisplayText::Update(content) | DisplayText::Query(content) => Ok(content),
            other => Err(Error::Other(format!(
                "display query answered with {:?}",
                other.function()
            ))),
        }
    }

    /// Measure P25 bit-error-rate over `frames` frames.
    ///
    /// Configures the receive chain for the P25 test pattern, arms a
    /// continuous measurement, waits out the measurement window, then
    /// reads the sync report. Frames that never held sync are ignored.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_p25_ber(&mut self, frames: u16) -> Result<f64> {
        self.send(&Message::request(
            Opcode::RX_TEST_PATTERN,
            vec![TestPattern::P25.as_u8()],
        ))?;

        let mut arm = vec![BerMode::Continuous.as_u8()];
        arm.extend_from_slice(&frames.to_be_bytes());
        self.send(&Message::request(Opcode::BER_TEST, arm))?;

        thread::sleep(BER_FRAME_TIME * u32::from(frames));

        let reply = self.send(&Message::request(Opcode::BER_REPORT, Bytes::new()))?;
        let entries = parse_ber_report(reply.payload())?;

        let counted: Vec<&BerReportEntry> =
            entries.iter().filter(|entry| entry.sync.is_counted()).collect();
        if counted.is_empty() {
            return Err(Error::Other(
                "BER report contained no synchronized frames".into(),
            ));
        }
        let total_errors: u64 = counted.iter().map(|entry| u64::from(entry.bit_errors)).sum();
        let denominator = P25_FRAME_BITS * u64::from(frames) * counted.len() as u64;
        Ok(total_errors as f64 / denominator as f64)
    }
}
