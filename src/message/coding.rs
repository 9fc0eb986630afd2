//! Text encodings selectable through the `data_coding` field.

use std::fmt;

use super::MessageError;

/// Data coding schemes supported for short message text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataCoding {
    /// SMSC default alphabet, restricted to ASCII.
    Default,
    /// ISO-8859-1.
    Latin1,
    /// UCS-2, written as big-endian UTF-16.
    #[default]
    Ucs2,
}

impl DataCoding {
    /// Wire value of the `data_coding` field.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Default => 0x00,
            Self::Latin1 => 0x03,
            Self::Ucs2 => 0x08,
        }
    }

    /// Map a wire value back to a supported coding.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 | 0x01 => Some(Self::Default),
            0x03 => Some(Self::Latin1),
            0x08 => Some(Self::Ucs2),
            _ => None,
        }
    }

    /// Pick the narrowest coding able to represent `text`.
    #[must_use]
    pub fn narrowest(text: &str) -> Self {
        if text.is_ascii() {
            Self::Default
        } else if text.chars().all(|c| u32::from(c) <= 0xFF) {
            Self::Latin1
        } else {
            Self::Ucs2
        }
    }

    /// Encode `text` into wire octets.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Unrepresentable`] when a character has no
    /// representation in this coding.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, MessageError> {
        match self {
            Self::Default => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(MessageError::Unrepresentable {
                            coding: self,
                            character: c,
                        })
                    }
                })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| MessageError::Unrepresentable {
                        coding: self,
                        character: c,
                    })
                })
                .collect(),
            Self::Ucs2 => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }

    /// Decode wire octets carried with the given `data_coding` value.
    ///
    /// Unknown codings are decoded as Latin-1 so no octet is lost.
    #[must_use]
    pub fn decode(code: u8, octets: &[u8]) -> String {
        match Self::from_code(code) {
            Some(Self::Ucs2) => {
                let units: Vec<u16> = octets
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            _ => octets.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Latin1 => "latin1",
            Self::Ucs2 => "ucs2",
        };
        f.write_str(name)
    }
}
