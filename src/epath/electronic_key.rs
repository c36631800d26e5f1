//! Electronic Key segment decoder
//!
//! The Electronic Key is the special-format Logical segment carrying the
//! device identity an originator expects at the target: vendor, device
//! type, product code and revision, optionally extended with the device
//! serial number.

use serde::Serialize;

use crate::buffer::ByteCursor;
use crate::error::DecodeError;

/// Key format carrying vendor/type/code/revision
pub const KEY_FORMAT_TABLE: u8 = 4;
/// Key format additionally carrying the 32-bit device serial number
pub const KEY_FORMAT_SERIAL_NUMBER: u8 = 5;

/// Decoded Electronic Key segment payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectronicKey {
    pub vendor_id: u16,
    pub device_type: u16,
    pub product_code: u16,
    /// Major revision, 7 bits
    pub major_revision: u8,
    /// When set, any device compatible with the key is acceptable
    pub compatibility: bool,
    pub minor_revision: u8,
    /// Present only for the serial-number key format
    pub serial_number: Option<u32>,
}

/// Decode an Electronic Key starting at its key-format byte
pub fn decode_electronic_key(cursor: &mut ByteCursor<'_>) -> Result<ElectronicKey, DecodeError> {
    let format_offset = cursor.position();
    let format = cursor.read_u8()?;

    if format != KEY_FORMAT_TABLE && format != KEY_FORMAT_SERIAL_NUMBER {
        return Err(DecodeError::UnsupportedFormat {
            what: "electronic key format",
            value: format,
            offset: format_offset,
        });
    }

    let vendor_id = cursor.read_u16_le()?;
    let device_type = cursor.read_u16_le()?;
    let product_code = cursor.read_u16_le()?;

    let major_byte = cursor.read_u8()?;
    let compatibility = major_byte & 0x80 != 0;
    let major_revision = major_byte & 0x7F;
    let minor_revision = cursor.read_u8()?;

    let serial_number = if format == KEY_FORMAT_SERIAL_NUMBER {
        Some(cursor.read_u32_le()?)
    } else {
        None
    };

    Ok(ElectronicKey {
        vendor_id,
        device_type,
        product_code,
        major_revision,
        compatibility,
        minor_revision,
        serial_number,
    })
}
