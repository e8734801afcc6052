//! Typed view over DEVICE_INIT_STATUS broadcast payloads.

use crate::error::{Error, Result};

/// Fixed part of the payload before the attribute entries.
const FIXED_LEN: usize = 10;

/// Initialization phase reported by the broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InitType {
    /// Device is still initialising.
    InitStatus = 0x00,
    /// Initialisation finished.
    InitComplete = 0x01,
    /// Status changed after initialisation.
    StatusUpdate = 0x02,
}

impl InitType {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::InitStatus),
            0x01 => Some(Self::InitComplete),
            0x02 => Some(Self::StatusUpdate),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Device status bitfield; the most significant bit flags a fatal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus(u16);

impl DeviceStatus {
    /// Construct from the raw bitfield.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw bitfield.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Whether the fatal bit is set.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        self.0 & 0x8000 != 0
    }
}

/// One (attribute-id, value) entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAttribute {
    /// Attribute identifier.
    pub id: u8,
    /// Attribute value.
    pub value: u8,
}

/// A DEVICE_INIT_STATUS broadcast payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInitStatus {
    /// XCMP protocol version advertised by the device.
    pub version: u32,
    /// Initialisation phase.
    pub init_type: InitType,
    /// Device type identifier.
    pub device_type: u8,
    /// Status bitfield.
    pub status: DeviceStatus,
    /// Attribute entries.
    pub attributes: Vec<DeviceAttribute>,
}

impl DeviceInitStatus {
    /// Encode to payload bytes.
    ///
    /// The attribute-length byte counts entries, not bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FIXED_LEN + self.attributes.len() * 2);
        bytes.extend_from_slice(&self.version.to_be_bytes());
        bytes.push(self.init_type.as_u8());
        bytes.push(self.device_type);
        bytes.extend_from_slice(&self.status.value().to_be_bytes());
        bytes.push(self.attributes.len() as u8);
        bytes.push(0x00);
        for attribute in &self.attributes {
            bytes.push(attribute.id);
            bytes.push(attribute.value);
        }
        bytes
    }

    /// Decode from payload bytes.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < FIXED_LEN {
            return Err(Error::BufferTooSmall {
                needed: FIXED_LEN,
                got: payload.len(),
            });
        }

        let version = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let init_type = InitType::from_u8(payload[4])
            .ok_or_else(|| Error::Other(format!("unknown init type {:#04x}", payload[4])))?;
        let device_type = payload[5];
        let status = DeviceStatus::new(u16::from_be_bytes([payload[6], payload[7]]));
        let count = payload[8] as usize;

        // The count is in entries, so the span it claims is twice as long.
        let declared = FIXED_LEN + count * 2;
        if payload.len() != declared {
            return Err(Error::Framing {
                declared,
                available: payload.len(),
            });
        }

        let attributes = payload[FIXED_LEN..]
            .chunks_exact(2)
            .map(|pair| DeviceAttribute {
                id: pair[0],
                value: pair[1],
            })
            .collect();

        Ok(Self {
            version,
            init_type,
            device_type,
            status,
            attributes,
        })
    }
}
