//! Typed view over DISPLAY_TEXT payloads.
//!
//! The wire payload starts with a one-byte function selector; only the
//! update and query functions carry the full content block, so each
//! function is its own variant and carries only the fields it legitimately
//! has. A query request ships an empty text; the query response comes back
//! in the same layout carrying the region's current text.

use std::time::Duration;

use crate::error::{Error, Result};

/// Token value carried by the functions that do not tag their exchanges.
const NO_TOKEN: u8 = 0xFF;

/// Function selector, the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisplayFunction {
    /// Write text into a display region.
    Update = 0x00,
    /// Read back the text currently shown in a region.
    Query = 0x01,
    /// Close a region and return it to the radio.
    Close = 0x02,
    /// Drive every pixel on (display test).
    AllPixelsOn = 0x03,
    /// Drive every pixel off (display test).
    AllPixelsOff = 0x04,
    /// Force a refresh of the display.
    Refresh = 0x05,
}

impl DisplayFunction {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Update),
            0x01 => Some(Self::Query),
            0x02 => Some(Self::Close),
            0x03 => Some(Self::AllPixelsOn),
            0x04 => Some(Self::AllPixelsOff),
            0x05 => Some(Self::Refresh),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Logical display region, packed into the low 5 bits of the region byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRegion(u8);

impl DisplayRegion {
    /// Main text zone.
    pub const PRIMARY: Self = Self(0x01);
    /// Secondary text zone.
    pub const SECONDARY: Self = Self(0x02);
    /// Status line.
    pub const STATUS: Self = Self(0x03);
    /// Menu area.
    pub const MENU: Self = Self(0x04);

    /// Construct a region, masking to the 5-bit range.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value & 0x1F)
    }

    /// Raw 5-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Logical display id, packed into the high 3 bits of the region byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayId(u8);

impl DisplayId {
    /// The radio's front display.
    pub const PRIMARY: Self = Self(0x01);
    /// Auxiliary display on control heads that carry one.
    pub const AUXILIARY: Self = Self(0x02);

    /// Construct an id, masking to the 3-bit range.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value & 0x07)
    }

    /// Raw 3-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Display timer in 500 ms units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTimer(u16);

impl DisplayTimer {
    /// Text stays until replaced or the region is closed.
    pub const PERMANENT: Self = Self(0x0000);
    /// Radio-chosen default timeout.
    pub const DEFAULT: Self = Self(0x00FF);

    /// Construct from the raw 16-bit value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw 16-bit value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Concrete duration, when the value is neither permanent nor default.
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::PERMANENT | Self::DEFAULT => None,
            Self(units) => Some(Duration::from_millis(u64::from(units) * 500)),
        }
    }
}

/// Text encodings the display accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextEncoding {
    /// One byte per character, Latin-1 repertoire.
    Iso8859_1 = 0x00,
    /// Two big-endian bytes per character, Basic Multilingual Plane.
    Ucs2 = 0x01,
}

impl TextEncoding {
    /// Convert from the wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Iso8859_1),
            0x01 => Some(Self::Ucs2),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Content block carried by the update and query functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayContent {
    /// Caller-chosen tag echoed by the radio.
    pub token: u8,
    /// Target region.
    pub region: DisplayRegion,
    /// Target display.
    pub id: DisplayId,
    /// How long the text stays up.
    pub timer: DisplayTimer,
    /// Priority class, 1 (highest) through 5.
    pub message_class: u8,
    /// Encoding of the text field on the wire.
    pub encoding: TextEncoding,
    /// The text itself.
    pub text: String,
}

/// A DISPLAY_TEXT payload, one variant per function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayText {
    /// Write text into a region.
    Update(DisplayContent),
    /// Read a region back; the reply carries the same layout.
    Query(DisplayContent),
    /// Close a region.
    Close,
    /// All-pixels-on display test.
    AllPixelsOn,
    /// All-pixels-off display test.
    AllPixelsOff,
    /// Force a display refresh.
    Refresh,
}

impl DisplayText {
    /// Function selector for this variant.
    #[must_use]
    pub const fn function(&self) -> DisplayFunction {
        match self {
            Self::Update(_) => DisplayFunction::Update,
            Self::Query(_) => DisplayFunction::Query,
            Self::Close => DisplayFunction::Close,
            Self::AllPixelsOn => DisplayFunction::AllPixelsOn,
            Self::AllPixelsOff => DisplayFunction::AllPixelsOff,
            Self::Refresh => DisplayFunction::Refresh,
        }
    }

    /// Encode to payload bytes.
    ///
    /// The text-byte-length field is derived from the encoded text, so the
    /// declared length always matches the span that follows it.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let content = match self {
            Self::Update(content) | Self::Query(content) => content,
            _ => return Ok(vec![self.function().as_u8(), NO_TOKEN]),
        };

        let text = encode_text(&content.text, content.encoding)?;
        let text_len = u16::try_from(text.len())
            .map_err(|_| Error::Encoding("text longer than a display frame".into()))?;
        let mut bytes = Vec::with_capacity(9 + text.len());
        bytes.push(self.function().as_u8());
        bytes.push(content.token);
        bytes.push((content.id.value() << 5) | content.region.value());
        bytes.extend_from_slice(&content.timer.value().to_be_bytes());
        bytes.push(content.message_class);
        bytes.push(content.encoding.as_u8());
        bytes.extend_from_slice(&text_len.to_be_bytes());
        bytes.extend_from_slice(&text);
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

        let function = DisplayFunction::from_u8(payload[0])
            .ok_or_else(|| Error::Other(format!("unknown display function {:#04x}", payload[0])))?;
        match function {
            DisplayFunction::Close => return Ok(Self::Close),
            DisplayFunction::AllPixelsOn => return Ok(Self::AllPixelsOn),
            DisplayFunction::AllPixelsOff => return Ok(Self::AllPixelsOff),
            DisplayFunction::Refresh => return Ok(Self::Refresh),
            DisplayFunction::Update | DisplayFunction::Query => {}
        }

        if payload.len() < 9 {
            return Err(Error::BufferTooSmall {
                needed: 9,
                got: payload.len(),
            });
        }

        let token = payload[1];
        let region = DisplayRegion::new(payload[2] & 0x1F);
        let id = DisplayId::new(payload[2] >> 5);
        let timer = DisplayTimer::new(u16::from_be_bytes([payload[3], payload[4]]));
        let message_class = payload[5];
        let encoding = TextEncoding::from_u8(payload[6]).ok_or(Error::UnsupportedEncoding {
            encoding: payload[6],
        })?;
        let text_len = u16::from_be_bytes([payload[7], payload[8]]) as usize;
        if payload.len() - 9 != text_len {
            return Err(Error::Framing {
                declared: text_len,
                available: payload.len() - 9,
            });
        }
        let text = decode_text(&payload[9..], encoding)?;

        let content = DisplayContent {
            token,
            region,
            id,
            timer,
            message_class,
            encoding,
            text,
        };
        Ok(match function {
            DisplayFunction::Update => Self::Update(content),
            _ => Self::Query(content),
        })
    }
}

fn encode_text(text: &str, encoding: TextEncoding) -> Result<Vec<u8>> {
    match encoding {
        TextEncoding::Iso8859_1 => text
            .chars()
            .map(|ch| {
                u8::try_from(u32::from(ch))
                    .map_err(|_| Error::Encoding(format!("{ch:?} not representable in ISO-8859-1")))
            })
            .collect(),
        TextEncoding::Ucs2 => {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for ch in text.chars() {
                let code = u16::try_from(u32::from(ch))
                    .map_err(|_| Error::Encoding(format!("{ch:?} outside the UCS-2 plane")))?;
                bytes.extend_from_slice(&code.to_be_bytes());
            }
            Ok(bytes)
        }
    }
}

fn decode_text(bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    match encoding {
        TextEncoding::Iso8859_1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        TextEncoding::Ucs2 => {
            if bytes.len() % 2 != 0 {
                return Err(Error::Encoding(format!(
                    "UCS-2 text length {} is not even",
                    bytes.len()
                )));
            }
            bytes
                .chunks_exact(2)
                .map(|pair| {
                    let code = u32::from(u16::from_be_bytes([pair[0], pair[1]]));
                    char::from_u32(code)
                        .ok_or_else(|| Error::Encoding(format!("invalid UCS-2 unit {code:#06x}")))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_update() -> DisplayText {
        DisplayText::Update(DisplayContent {
            token: 0xFF,
            region: DisplayRegion::PRIMARY,
            id: DisplayId::PRIMARY,
            timer: DisplayTimer::PERMANENT,
            message_class: 3,
            encoding: TextEncoding::Iso8859_1,
            text: "HELLO".to_string(),
        })
    }

    #[test]
    fn test_update_payload_bytes() {
        let expected = [
            0x00, 0xFF, 0x21, 0x00, 0x00, 0x03, 0x00, 0x00, 0x05, 0x48, 0x45, 0x4C, 0x4C, 0x4F,
        ];
        assert_eq!(hello_update().encode().unwrap(), expected);
    }

    #[test]
    fn test_update_roundtrip() {
        let original = hello_update();
        let decoded = DisplayText::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_ucs2_roundtrip() {
        let original = DisplayText::Update(DisplayContent {
            token: 0x07,
            region: DisplayRegion::SECONDARY,
            id: DisplayId::PRIMARY,
            timer: DisplayTimer::new(4),
            message_class: 1,
            encoding: TextEncoding::Ucs2,
            text: "kanál č.7".to_string(),
        });
        let bytes = original.encode().unwrap();
        let decoded = DisplayText::decode(&bytes).unwrap();
        assert_eq!(decoded, original);

        // Declared length counts encoded bytes, two per character.
        let declared = u16::from_be_bytes([bytes[7], bytes[8]]) as usize;
        assert_eq!(declared, "kanál č.7".chars().count() * 2);
    }

    #[test]
    fn test_bare_functions_are_two_bytes() {
        for variant in [
            DisplayText::Close,
            DisplayText::AllPixelsOn,
            DisplayText::AllPixelsOff,
            DisplayText::Refresh,
        ] {
            let bytes = variant.encode().unwrap();
            assert_eq!(bytes.len(), 2);
            assert_eq!(bytes[1], 0xFF);
            assert_eq!(DisplayText::decode(&bytes).unwrap(), variant);
        }
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let mut bytes = hello_update().encode().unwrap();
        bytes[6] = 0x7E;
        assert!(matches!(
            DisplayText::decode(&bytes),
            Err(Error::UnsupportedEncoding { encoding: 0x7E })
        ));
    }

    #[test]
    fn test_iso8859_rejects_wide_chars() {
        let msg = DisplayText::Update(DisplayContent {
            text: "Δ".to_string(),
            ..match hello_update() {
                DisplayText::Update(content) => content,
                _ => unreachable!(),
            }
        });
        assert!(matches!(msg.encode(), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_text_length_mismatch_rejected() {
        let mut bytes = hello_update().encode().unwrap();
        bytes[8] = 0x04;
        assert!(matches!(DisplayText::decode(&bytes), Err(Error::Framing { .. })));
    }

    #[test]
    fn test_timer_semantics() {
        assert_eq!(DisplayTimer::PERMANENT.duration(), None);
        assert_eq!(DisplayTimer::DEFAULT.duration(), None);
        assert_eq!(
            DisplayTimer::new(4).duration(),
            Some(Duration::from_millis(2000))
        );
    }

    // Property-based tests
    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn latin1_text() -> impl Strategy<Value = String> {
            prop::collection::vec(1u8..=0xFF, 0..64)
                .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
        }

        fn bmp_text() -> impl Strategy<Value = String> {
            prop::collection::vec(
                any::<char>().prop_filter("BMP only", |ch| u32::from(*ch) <= 0xFFFF),
                0..64,
            )
            .prop_map(|chars| chars.into_iter().collect())
        }

        proptest! {
            /// Property: setting text and decoding it back is the identity,
            /// and the length field counts the encoded bytes.
            #[test]
            fn prop_text_roundtrip_latin1(token in any::<u8>(), text in latin1_text()) {
                let original = DisplayText::Update(DisplayContent {
                    token,
                    region: DisplayRegion::PRIMARY,
                    id: DisplayId::PRIMARY,
                    timer: DisplayTimer::DEFAULT,
                    message_class: 2,
                    encoding: TextEncoding::Iso8859_1,
                    text: text.clone(),
                });
                let bytes = original.encode().unwrap();
                let declared = u16::from_be_bytes([bytes[7], bytes[8]]) as usize;
                prop_assert_eq!(declared, text.chars().count());
                prop_assert_eq!(DisplayText::decode(&bytes).unwrap(), original);
            }

            /// Property: UCS-2 round trip over the Basic Multilingual Plane.
            #[test]
            fn prop_text_roundtrip_ucs2(text in bmp_text()) {
                let original = DisplayText::Query(DisplayContent {
                    token: 0x11,
                    region: DisplayRegion::STATUS,
                    id: DisplayId::AUXILIARY,
                    timer: DisplayTimer::PERMANENT,
                    message_class: 5,
                    encoding: TextEncoding::Ucs2,
                    text: text.clone(),
                });
                let bytes = original.encode().unwrap();
                let declared = u16::from_be_bytes([bytes[7], bytes[8]]) as usize;
                prop_assert_eq!(declared, text.chars().count() * 2);
                prop_assert_eq!(DisplayText::decode(&bytes).unwrap(), original);
            }
        }
    }
}
