//! Typed view over SOFTPOT payloads.
//!
//! Softpots are named, persisted analogue calibration parameters. Each
//! softpot type carries values of a fixed width (1, 2, or 4 bytes), and the
//! values travel little-endian, unlike every other field in the stack.

use std::fmt;

use crate::error::{Error, Result};

/// Operation selector, the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoftpotOp {
    /// Read the current value.
    Read = 0x00,
    /// Write and persist a value.
    Write = 0x01,
    /// Update the working value without persisting it.
    Update = 0x02,
    /// Read the calibrated minimum.
    ReadMin = 0x03,
    /// Read the calibrated maximum.
    ReadMax = 0x04,
    /// Read every tuning point.
    ReadAll = 0x05,
    /// Read every tuning point with its frequency.
    ReadAllFreq = 0x06,
}

impl SoftpotOp {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Read),
            0x01 => Some(Self::Write),
            0x02 => Some(Self::Update),
            0x03 => Some(Self::ReadMin),
            0x04 => Some(Self::ReadMax),
            0x05 => Some(Self::ReadAll),
            0x06 => Some(Self::ReadAllFreq),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Softpot type selector.
///
/// The width of a softpot's values is a property of its type; unlisted
/// identifiers carry 16-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoftpotType(u8);

impl SoftpotType {
    /// Reference oscillator trim.
    pub const REF_OSC: Self = Self(0x01);
    /// Transmit power, high setting.
    pub const TX_POWER_HIGH: Self = Self(0x02);
    /// Transmit power, low setting.
    pub const TX_POWER_LOW: Self = Self(0x03);
    /// Transmit deviation.
    pub const TX_DEVIATION: Self = Self(0x04);
    /// Modulation balance.
    pub const MOD_BALANCE: Self = Self(0x05);
    /// Battery meter calibration.
    pub const BATTERY_CAL: Self = Self(0x06);
    /// Received signal strength calibration.
    pub const RSSI_CAL: Self = Self(0x07);
    /// Fine frequency trim.
    pub const FREQ_TRIM: Self = Self(0x08);

    /// Construct from the raw selector byte.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw selector byte.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Width in bytes of this softpot's values on the wire.
    #[must_use]
    pub const fn value_width(self) -> usize {
        match self {
            Self::MOD_BALANCE | Self::BATTERY_CAL => 1,
            Self::FREQ_TRIM => 4,
            _ => 2,
        }
    }
}

impl fmt::Display for SoftpotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// A SOFTPOT payload: operation, type, and zero or more values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Softpot {
    /// Operation selector.
    pub op: SoftpotOp,
    /// Softpot the operation targets.
    pub softpot: SoftpotType,
    /// Values at [`SoftpotType::value_width`]; empty for pure reads.
    pub values: Vec<u32>,
}

impl Softpot {
    /// Request the current value of a softpot.
    #[must_use]
    pub const fn read(softpot: SoftpotType) -> Self {
        Self {
            op: SoftpotOp::Read,
            softpot,
            values: Vec::new(),
        }
    }

    /// Write and persist a softpot value.
    #[must_use]
    pub fn write(softpot: SoftpotType, value: u32) -> Self {
        Self {
            op: SoftpotOp::Write,
            softpot,
            values: vec![value],
        }
    }

    /// Update the working value without persisting it.
    #[must_use]
    pub fn update(softpot: SoftpotType, value: u32) -> Self {
        Self {
            op: SoftpotOp::Update,
            softpot,
            values: vec![value],
        }
    }

    /// Request every tuning point.
    #[must_use]
    pub const fn read_all(softpot: SoftpotType) -> Self {
        Self {
            op: SoftpotOp::ReadAll,
            softpot,
            values: Vec::new(),
        }
    }

    /// Request the calibrated minimum.
    #[must_use]
    pub const fn read_min(softpot: SoftpotType) -> Self {
        Self {
            op: SoftpotOp::ReadMin,
            softpot,
            values: Vec::new(),
        }
    }

    /// Request the calibrated maximum.
    #[must_use]
    pub const fn read_max(softpot: SoftpotType) -> Self {
        Self {
            op: SoftpotOp::ReadMax,
            softpot,
            values: Vec::new(),
        }
    }

    /// First value, if the message carries one.
    #[must_use]
    pub fn value(&self) -> Option<u32> {
        self.values.first().copied()
    }

    /// Encode to payload bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let width = self.softpot.value_width();
        let mut bytes = Vec::with_capacity(2 + self.values.len() * width);
        bytes.push(self.op.as_u8());
        bytes.push(self.softpot.value());
        for &value in &self.values {
            bytes.extend_from_slice(&value_to_bytes(value, width)?);
        }
        Ok(bytes)
    }

    /// Decode from payload bytes.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 2 {
            return Err(Error::BufferTooSmall {
                needed: 2,
                got: payload.len(),
            });
        }

        let op = SoftpotOp::from_u8(payload[0])
            .ok_or_else(|| Error::Other(format!("unknown softpot operation {:#04x}", payload[0])))?;
        let softpot = SoftpotType::new(payload[1]);
        let width = softpot.value_width();

        let span = &payload[2..];
        if span.len() % width != 0 {
            return Err(Error::UnsupportedWidth {
                width: span.len() % width,
            });
        }
        let values = span
            .chunks_exact(width)
            .map(bytes_to_value)
            .collect::<Result<Vec<u32>>>()?;

        Ok(Self {
            op,
            softpot,
            values,
        })
    }
}

/// Serialise a value little-endian at the given width.
pub fn value_to_bytes(value: u32, width: usize) -> Result<Vec<u8>> {
    let le = value.to_le_bytes();
    match width {
        1 | 2 | 4 => Ok(le[..width].to_vec()),
        other => Err(Error::UnsupportedWidth { width: other }),
    }
}

/// Read a little-endian value of 1, 2, or 4 bytes.
pub fn bytes_to_value(bytes: &[u8]) -> Result<u32> {
    let mut le = [0u8; 4];
    match bytes.len() {
        width @ (1 | 2 | 4) => {
            le[..width].copy_from_slice(bytes);
            Ok(u32::from_le_bytes(le))
        }
        other => Err(Error::UnsupportedWidth { width: other }),
    }
}
