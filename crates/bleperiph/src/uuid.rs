//! Bluetooth UUIDs
//!
//! Attribute types and service identities are 128-bit UUIDs. SIG-assigned
//! 16-bit values are expanded onto the Bluetooth base UUID so that both forms
//! compare equal.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit Bluetooth UUID, stored little-endian.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// "00000000-0000-1000-8000-00805F9B34FB" in little-endian order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where a 16-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a UUID from 16 little-endian bytes.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a UUID from its canonical 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Uuid {
            bytes: value.to_le_bytes(),
        }
    }

    /// Creates a UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Returns the bytes in big-endian order.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    /// Returns the short form if this is a SIG-assigned 16-bit UUID.
    pub fn as_u16(&self) -> Option<u16> {
        let sig_assigned = self.bytes[..BASE_OFFSET] == BASE_UUID_BYTES[..BASE_OFFSET];
        if sig_assigned && self.bytes[BASE_OFFSET + 2] == 0 && self.bytes[BASE_OFFSET + 3] == 0 {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u16() {
            Some(short) => write!(f, "Uuid(0x{:04X})", short),
            None => write!(f, "Uuid({})", self),
        }
    }
}

#[derive(Debug, Error)]
pub enum UuidParseError {
    #[error("UUID must have 4 or 32 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("Invalid UUID digits: {0}")]
    InvalidDigits(#[from] ParseIntError),

    #[error("Invalid UUID hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts "180A", "0x180a" or the hyphenated 128-bit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let cleaned: String = trimmed.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => Ok(Uuid::from_u16(u16::from_str_radix(&cleaned, 16)?)),
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                bytes_be.reverse();
                Ok(Uuid::from_bytes_le(bytes_be))
            }
            n => Err(UuidParseError::InvalidLength(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_round_trips_through_base_uuid() {
        let uuid = Uuid::from_u16(0x180F);
        assert_eq!(uuid.as_u16(), Some(0x180F));
        assert_eq!(uuid.to_string(), "0000180f-0000-1000-8000-00805f9b34fb");
        assert_eq!(uuid, 0x180Fu16);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("180A".parse::<Uuid>().unwrap(), Uuid::from_u16(0x180A));
        assert_eq!("0x2a19".parse::<Uuid>().unwrap(), Uuid::from_u16(0x2A19));

        let ota: Uuid = "cb0b9a0b-a84c-4c0d-bdbb-442e3144ee30".parse().unwrap();
        assert_eq!(ota, Uuid::from_u128(0xcb0b9a0b_a84c_4c0d_bdbb_442e3144ee30));
        assert_eq!(ota.as_u16(), None);
        assert_eq!(ota.to_string(), "cb0b9a0b-a84c-4c0d-bdbb-442e3144ee30");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(matches!(
            "12345".parse::<Uuid>(),
            Err(UuidParseError::InvalidLength(5))
        ));
    }
}
