//! Safety Network Segment decoder
//!
//! CIP Safety carries its connection parameters inside a Network segment of
//! the Forward Open connection path. Three formats are defined: Target,
//! Router and Extended. The field layout is entirely determined by the
//! format byte; the Router format omits the SCID (configuration CRC and
//! timestamp) that Target and Extended carry. An unrecognized format byte
//! keeps the remaining declared bytes as opaque data unless strict
//! validation is requested.

use log::debug;
use serde::Serialize;

use crate::buffer::ByteCursor;
use crate::error::DecodeError;

pub const SAFETY_FORMAT_TARGET: u8 = 0;
pub const SAFETY_FORMAT_ROUTER: u8 = 1;
pub const SAFETY_FORMAT_EXTENDED: u8 = 2;

/// Safety Network Number: a 6-byte date/time stamp identifying a safety
/// network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyNetworkNumber {
    pub date: u16,
    pub time: u32,
}

impl SafetyNetworkNumber {
    pub fn is_zero(&self) -> bool {
        self.date == 0 && self.time == 0
    }

    fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            date: cursor.read_u16_le()?,
            time: cursor.read_u32_le()?,
        })
    }
}

/// Unique Node Identifier: node id qualified by its safety network number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Unid {
    pub snn: SafetyNetworkNumber,
    pub node_id: u32,
}

impl Unid {
    fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            snn: SafetyNetworkNumber::decode(cursor)?,
            node_id: cursor.read_u32_le()?,
        })
    }
}

/// Safety Configuration ID: configuration CRC plus configuration timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scid {
    pub configuration_crc: u32,
    pub configuration_timestamp: SafetyNetworkNumber,
}

impl Scid {
    /// True when both the CRC and the timestamp are all-zero
    pub fn is_zero(&self) -> bool {
        self.configuration_crc == 0 && self.configuration_timestamp.is_zero()
    }

    fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            configuration_crc: cursor.read_u32_le()?,
            configuration_timestamp: SafetyNetworkNumber::decode(cursor)?,
        })
    }
}

/// Timing multipliers shared by all safety formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyTiming {
    pub ping_interval_epi_multiplier: u16,
    pub time_coord_msg_min_multiplier: u16,
    pub network_time_expectation_multiplier: u16,
    pub timeout_multiplier: u8,
    pub max_consumer_number: u8,
}

impl SafetyTiming {
    fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            ping_interval_epi_multiplier: cursor.read_u16_le()?,
            time_coord_msg_min_multiplier: cursor.read_u16_le()?,
            network_time_expectation_multiplier: cursor.read_u16_le()?,
            timeout_multiplier: cursor.read_u8()?,
            max_consumer_number: cursor.read_u8()?,
        })
    }
}

/// Router format: timing and time-correction fields only, no SCID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterFormat {
    pub time_correction_epi: u32,
    pub time_correction_conn_params: u16,
    pub timing: SafetyTiming,
    pub time_correction_conn_id: u32,
}

/// Target format: SCID, target/originator UNIDs, timing, parameter CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetFormat {
    pub scid: Scid,
    pub target_unid: Unid,
    pub originator_unid: Unid,
    pub timing: SafetyTiming,
    pub time_correction_epi: u32,
    pub time_correction_conn_params: u16,
    pub connection_param_crc: u32,
    pub time_correction_conn_id: u32,
}

/// Extended format: Target plus fault limits and initial time state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtendedFormat {
    pub target: TargetFormat,
    pub max_fault_number: u16,
    pub initial_timestamp: SafetyNetworkNumber,
    pub initial_rollover: u16,
}

/// One decoded Safety Network Segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SafetySegment {
    Target(TargetFormat),
    Router(RouterFormat),
    Extended(ExtendedFormat),
    /// Unrecognized format byte: remaining declared bytes kept opaque
    Unknown { format: u8, data: Vec<u8> },
}

impl SafetySegment {
    /// SCID of this segment, for formats that carry one
    pub fn scid(&self) -> Option<&Scid> {
        match self {
            SafetySegment::Target(t) => Some(&t.scid),
            SafetySegment::Extended(e) => Some(&e.target.scid),
            SafetySegment::Router(_) | SafetySegment::Unknown { .. } => None,
        }
    }
}

fn decode_router(cursor: &mut ByteCursor<'_>) -> Result<RouterFormat, DecodeError> {
    let _reserved = cursor.read_u8()?;
    Ok(RouterFormat {
        time_correction_epi: cursor.read_u32_le()?,
        time_correction_conn_params: cursor.read_u16_le()?,
        timing: SafetyTiming::decode(cursor)?,
        time_correction_conn_id: cursor.read_u32_le()?,
    })
}

fn decode_target(cursor: &mut ByteCursor<'_>) -> Result<TargetFormat, DecodeError> {
    let _reserved = cursor.read_u8()?;
    let scid = Scid::decode(cursor)?;
    let target_unid = Unid::decode(cursor)?;
    let originator_unid = Unid::decode(cursor)?;
    let timing = SafetyTiming::decode(cursor)?;
    Ok(TargetFormat {
        scid,
        target_unid,
        originator_unid,
        timing,
        time_correction_epi: cursor.read_u32_le()?,
        time_correction_conn_params: cursor.read_u16_le()?,
        connection_param_crc: cursor.read_u32_le()?,
        time_correction_conn_id: cursor.read_u32_le()?,
    })
}

fn decode_extended(cursor: &mut ByteCursor<'_>) -> Result<ExtendedFormat, DecodeError> {
    let target = decode_target(cursor)?;
    Ok(ExtendedFormat {
        target,
        max_fault_number: cursor.read_u16_le()?,
        initial_timestamp: SafetyNetworkNumber::decode(cursor)?,
        initial_rollover: cursor.read_u16_le()?,
    })
}

/// Decode a safety segment body of exactly `body_len` bytes, format byte
/// included
///
/// `strict` rejects unknown format bytes instead of keeping them opaque.
pub fn decode_safety_segment(
    cursor: &mut ByteCursor<'_>,
    body_len: usize,
    strict: bool,
) -> Result<SafetySegment, DecodeError> {
    let body_offset = cursor.position();
    let mut body = cursor.sub_cursor(body_len)?;

    let format_offset = body.position();
    let format = body.read_u8()?;

    let segment = match format {
        SAFETY_FORMAT_TARGET => SafetySegment::Target(decode_target(&mut body)?),
        SAFETY_FORMAT_ROUTER => SafetySegment::Router(decode_router(&mut body)?),
        SAFETY_FORMAT_EXTENDED => SafetySegment::Extended(decode_extended(&mut body)?),
        other => {
            if strict {
                return Err(DecodeError::UnsupportedFormat {
                    what: "safety segment format",
                    value: other,
                    offset: format_offset,
                });
            }
            let data = body.take_remaining().to_vec();
            debug!(
                "Unknown safety segment format 0x{:02x}, keeping opaque: {}",
                other,
                crate::utils::bytes_to_hex(&data)
            );
            SafetySegment::Unknown { format: other, data }
        }
    };

    // Known formats must account for the declared body exactly
    if !body.is_empty() {
        return Err(DecodeError::InconsistentLength {
            offset: body_offset,
            declared: body_len,
            available: body_len - body.remaining(),
        });
    }

    Ok(segment)
}


#[cfg(test)]
mod tests {
    use super::*;

    /// Body bytes (format byte included) of a Target-format segment
    pub(crate) fn target_body(crc: u32, ts_date: u16, ts_time: u32) -> Vec<u8> {
        let mut body = vec![SAFETY_FORMAT_TARGET, 0x00]; // format, reserved
        body.extend_from_slice(&crc.to_le_bytes());
        body.extend_from_slice(&ts_date.to_le_bytes());
        body.extend_from_slice(&ts_time.to_le_bytes());
        // Target UNID: SNN date/time + node id
        body.extend_from_slice(&0x1111u16.to_le_bytes());
        body.extend_from_slice(&0x22222222u32.to_le_bytes());
        body.extend_from_slice(&0x0000000Au32.to_le_bytes());
        // Originator UNID
        body.extend_from_slice(&0x3333u16.to_le_bytes());
        body.extend_from_slice(&0x44444444u32.to_le_bytes());
        body.extend_from_slice(&0x0000000Bu32.to_le_bytes());
        // Timing: ping, coord, expectation, timeout mult, max consumers
        body.extend_from_slice(&100u16.to_le_bytes());
        body.extend_from_slice(&200u16.to_le_bytes());
        body.extend_from_slice(&300u16.to_le_bytes());
        body.push(2);
        body.push(1);
        // Time correction EPI + params, CPCRC, time correction conn id
        body.extend_from_slice(&50_000u32.to_le_bytes());
        body.extend_from_slice(&0x4802u16.to_le_bytes());
        body.extend_from_slice(&0xCAFEBABEu32.to_le_bytes());
        body.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        assert_eq!(body.len(), 54);
        body
    }

    #[test]
    fn test_decode_target_format() {
        let body = target_body(0x1234_5678, 0xA0A0, 0xB1B1_B2B2);
        let mut cursor = ByteCursor::new(&body);

        let seg = decode_safety_segment(&mut cursor, body.len(), false).unwrap();
        let target = match seg {
            SafetySegment::Target(t) => t,
            other => panic!("expected target format, got {:?}", other),
        };
        assert_eq!(target.scid.configuration_crc, 0x1234_5678);
        assert_eq!(target.scid.configuration_timestamp.date, 0xA0A0);
        assert_eq!(target.target_unid.node_id, 0x0A);
        assert_eq!(target.originator_unid.node_id, 0x0B);
        assert_eq!(target.timing.ping_interval_epi_multiplier, 100);
        assert_eq!(target.timing.timeout_multiplier, 2);
        assert_eq!(target.connection_param_crc, 0xCAFEBABE);
    }

    #[test]
    fn test_router_format_has_no_scid() {
        let mut body = vec![SAFETY_FORMAT_ROUTER, 0x00];
        body.extend_from_slice(&25_000u32.to_le_bytes()); // time correction EPI
        body.extend_from_slice(&0x4802u16.to_le_bytes()); // time correction params
        body.extend_from_slice(&100u16.to_le_bytes());
        body.extend_from_slice(&200u16.to_le_bytes());
        body.extend_from_slice(&300u16.to_le_bytes());
        body.push(4);
        body.push(1);
        body.extend_from_slice(&0x01020304u32.to_le_bytes());
        assert_eq!(body.len(), 20);

        let mut cursor = ByteCursor::new(&body);
        let seg = decode_safety_segment(&mut cursor, body.len(), false).unwrap();

        assert!(seg.scid().is_none());
        let router = match seg {
            SafetySegment::Router(r) => r,
            other => panic!("expected router format, got {:?}", other),
        };
        assert_eq!(router.time_correction_epi, 25_000);
        assert_eq!(router.time_correction_conn_id, 0x01020304);
    }

    #[test]
    fn test_decode_extended_format() {
        let mut body = target_body(0, 0, 0);
        body[0] = SAFETY_FORMAT_EXTENDED;
        body.extend_from_slice(&5u16.to_le_bytes()); // max fault number
        body.extend_from_slice(&0x0102u16.to_le_bytes()); // initial timestamp date
        body.extend_from_slice(&0x03040506u32.to_le_bytes()); // initial timestamp time
        body.extend_from_slice(&9u16.to_le_bytes()); // initial rollover
        assert_eq!(body.len(), 64);

        let mut cursor = ByteCursor::new(&body);
        let seg = decode_safety_segment(&mut cursor, body.len(), false).unwrap();

        let ext = match seg {
            SafetySegment::Extended(e) => e,
            other => panic!("expected extended format, got {:?}", other),
        };
        assert_eq!(ext.max_fault_number, 5);
        assert_eq!(ext.initial_rollover, 9);
        assert!(seg_scid_is_zero(&SafetySegment::Extended(ext)));
    }

    fn seg_scid_is_zero(seg: &SafetySegment) -> bool {
        seg.scid().map(Scid::is_zero).unwrap_or(false)
    }

    #[test]
    fn test_unknown_format_is_kept_opaque() {
        let body = [0x17, 0xDE, 0xAD, 0xBE, 0xEF, 0x00];
        let mut cursor = ByteCursor::new(&body);

        let seg = decode_safety_segment(&mut cursor, body.len(), false).unwrap();
        assert_eq!(
            seg,
            SafetySegment::Unknown {
                format: 0x17,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00],
            }
        );
    }

    #[test]
    fn test_unknown_format_rejected_when_strict() {
        let body = [0x17, 0xDE, 0xAD];
        let mut cursor = ByteCursor::new(&body);

        let err = decode_safety_segment(&mut cursor, body.len(), true).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedFormat {
                what: "safety segment format",
                value: 0x17,
                offset: 0,
            }
        );
    }

    #[test]
    fn test_declared_length_mismatch() {
        // Target body padded with 2 extra declared bytes
        let mut body = target_body(1, 2, 3);
        body.extend_from_slice(&[0x00, 0x00]);

        let mut cursor = ByteCursor::new(&body);
        let err = decode_safety_segment(&mut cursor, body.len(), false).unwrap_err();
        assert!(matches!(err, DecodeError::InconsistentLength { .. }));
    }

    #[test]
    fn test_truncated_body() {
        let body = [SAFETY_FORMAT_TARGET, 0x00, 0x01];
        let mut cursor = ByteCursor::new(&body);

        assert!(matches!(
            decode_safety_segment(&mut cursor, body.len(), false),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
