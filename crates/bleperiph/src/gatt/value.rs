//! Helpers for characteristic values written by peers

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

/// Decode a little-endian `u32`.
///
/// Peers may write partial or legacy-format values, so anything that is
/// not exactly four bytes yields `default`.
pub fn value_u32(value: &[u8], default: u32) -> u32 {
    if value.len() == 4 {
        LittleEndian::read_u32(value)
    } else {
        default
    }
}

/// Log a freshly written value at debug level.
pub fn dump_characteristic(value: &[u8]) {
    if value.is_empty() {
        return;
    }
    debug!(
        "New value: {} ({})",
        String::from_utf8_lossy(value),
        hex::encode(value)
    );
}
