//! Per-segment EPATH decoder
//!
//! Decodes exactly one segment from a cursor. The top 3 bits of the tag
//! byte select the segment category; each category has its own sub-format
//! rules, padding included. No state is carried between calls.

use crate::buffer::ByteCursor;
use crate::error::DecodeError;

use super::electronic_key::decode_electronic_key;
use super::safety::decode_safety_segment;
use super::{
    DataValue, LinkAddress, LogicalKind, LogicalWidth, NetworkValue, NumericWidth, Segment,
    SegmentKind, SymbolicValue,
};

const SEG_TYPE_MASK: u8 = 0xE0;
const SEG_TYPE_PORT: u8 = 0x00;
const SEG_TYPE_LOGICAL: u8 = 0x20;
const SEG_TYPE_NETWORK: u8 = 0x40;
const SEG_TYPE_SYMBOLIC: u8 = 0x60;
const SEG_TYPE_DATA: u8 = 0x80;

const PORT_EXTENDED_LINK: u8 = 0x10;
const PORT_ID_MASK: u8 = 0x0F;
const PORT_ID_EXTENDED: u16 = 0x0F;

const LOGICAL_KIND_MASK: u8 = 0x1C;
const LOGICAL_FORMAT_MASK: u8 = 0x03;

const NETWORK_SUBTYPE_MASK: u8 = 0x1F;
const NETWORK_SCHEDULE: u8 = 0x01;
const NETWORK_FIXED_TAG: u8 = 0x02;
const NETWORK_PROD_INHIBIT_MS: u8 = 0x03;
const NETWORK_SAFETY: u8 = 0x10;
const NETWORK_PROD_INHIBIT_US: u8 = 0x11;
const NETWORK_EXTENDED: u8 = 0x1F;

const SYMBOLIC_SIZE_MASK: u8 = 0x1F;
const SYMBOLIC_EXT_FORMAT_MASK: u8 = 0xE0;
const SYMBOLIC_EXT_DOUBLE: u8 = 0x20;
const SYMBOLIC_EXT_TRIPLE: u8 = 0x40;
const SYMBOLIC_EXT_NUMERIC: u8 = 0xC0;
const SYMBOLIC_NUMERIC_USINT: u8 = 6;
const SYMBOLIC_NUMERIC_UINT: u8 = 7;
const SYMBOLIC_NUMERIC_UDINT: u8 = 8;

const DATA_SUBTYPE_MASK: u8 = 0x1F;
const DATA_SIMPLE: u8 = 0x00;
const DATA_ANSI_SYMBOL: u8 = 0x11;

/// Decode one segment from the cursor
///
/// `packed` controls the alignment of 16/32-bit logical values: packed
/// paths omit the pad byte between tag and value for non-extended logical
/// segments. `strict_safety` rejects unknown Safety Network Segment formats
/// instead of keeping their bytes opaque.
pub fn decode_segment(
    cursor: &mut ByteCursor<'_>,
    packed: bool,
    strict_safety: bool,
) -> Result<Segment, DecodeError> {
    let start = cursor.position();
    let tag = cursor.read_u8()?;

    let kind = match tag & SEG_TYPE_MASK {
        SEG_TYPE_PORT => decode_port(cursor, tag, start)?,
        SEG_TYPE_LOGICAL => decode_logical(cursor, tag, start, packed)?,
        SEG_TYPE_NETWORK => decode_network(cursor, tag, start, strict_safety)?,
        SEG_TYPE_SYMBOLIC => decode_symbolic(cursor, tag, start)?,
        SEG_TYPE_DATA => decode_data(cursor, tag, start)?,
        _ => {
            return Err(DecodeError::UnsupportedFormat {
                what: "segment type",
                value: tag,
                offset: start,
            })
        }
    };

    Ok(Segment { kind, encoded_len: cursor.position() - start })
}

fn decode_port(
    cursor: &mut ByteCursor<'_>,
    tag: u8,
    start: usize,
) -> Result<SegmentKind, DecodeError> {
    let extended_link = tag & PORT_EXTENDED_LINK != 0;
    let mut port_id = u16::from(tag & PORT_ID_MASK);

    let link = if extended_link {
        let link_size = usize::from(cursor.read_u8()?);
        if port_id == PORT_ID_EXTENDED {
            port_id = cursor.read_u16_le()?;
        }
        let address = cursor.take(link_size)?.to_vec();
        // Extended link addresses pad the segment to an even byte count
        if (cursor.position() - start) % 2 != 0 {
            cursor.skip(1)?;
        }
        LinkAddress::Extended(address)
    } else {
        if port_id == PORT_ID_EXTENDED {
            port_id = cursor.read_u16_le()?;
        }
        LinkAddress::Numeric(cursor.read_u8()?)
    };

    Ok(SegmentKind::Port { extended_link, port_id, link })
}

fn decode_logical(
    cursor: &mut ByteCursor<'_>,
    tag: u8,
    tag_offset: usize,
    packed: bool,
) -> Result<SegmentKind, DecodeError> {
    let kind_bits = (tag & LOGICAL_KIND_MASK) >> 2;
    let format = tag & LOGICAL_FORMAT_MASK;

    let kind = match kind_bits {
        0 => LogicalKind::Class,
        1 => LogicalKind::Instance,
        2 => LogicalKind::Member,
        3 => LogicalKind::ConnectionPoint,
        4 => LogicalKind::Attribute,
        5 => {
            // Special format: only the Electronic Key layout is defined
            if format != 0 {
                return Err(DecodeError::UnsupportedFormat {
                    what: "special logical format",
                    value: format,
                    offset: tag_offset,
                });
            }
            let key = decode_electronic_key(cursor)?;
            return Ok(SegmentKind::ElectronicKey(key));
        }
        6 => LogicalKind::ServiceId,
        _ => LogicalKind::ExtendedLogical,
    };

    if kind == LogicalKind::ServiceId && format != 0 {
        return Err(DecodeError::UnsupportedFormat {
            what: "service id format",
            value: format,
            offset: tag_offset,
        });
    }

    // The extended type byte follows the tag immediately, before any pad
    let extended_type = if kind == LogicalKind::ExtendedLogical {
        Some(cursor.read_u8()?)
    } else {
        None
    };

    let width = match format {
        0 => LogicalWidth::Bits8,
        1 => LogicalWidth::Bits16,
        2 => LogicalWidth::Bits32,
        _ => {
            return Err(DecodeError::UnsupportedFormat {
                what: "logical format",
                value: format,
                offset: tag_offset,
            })
        }
    };

    // 16/32-bit values are preceded by a reserved pad byte; packed paths
    // omit it, but extended logical segments are never packed-exempt
    if width != LogicalWidth::Bits8 && (!packed || extended_type.is_some()) {
        cursor.skip(1)?;
    }

    let value = match width {
        LogicalWidth::Bits8 => u32::from(cursor.read_u8()?),
        LogicalWidth::Bits16 => u32::from(cursor.read_u16_le()?),
        LogicalWidth::Bits32 => cursor.read_u32_le()?,
    };

    Ok(SegmentKind::Logical { kind, width, value, extended_type })
}

fn decode_network(
    cursor: &mut ByteCursor<'_>,
    tag: u8,
    tag_offset: usize,
    strict_safety: bool,
) -> Result<SegmentKind, DecodeError> {
    let subtype = tag & NETWORK_SUBTYPE_MASK;

    let value = match subtype {
        NETWORK_SCHEDULE => NetworkValue::Schedule { value: cursor.read_u8()? },
        NETWORK_FIXED_TAG => NetworkValue::FixedTag { value: cursor.read_u8()? },
        NETWORK_PROD_INHIBIT_MS => NetworkValue::ProdInhibitMs { millis: cursor.read_u8()? },
        NETWORK_PROD_INHIBIT_US => {
            let len_offset = cursor.position();
            let words = usize::from(cursor.read_u8()?);
            if words != 2 {
                return Err(DecodeError::InconsistentLength {
                    offset: len_offset,
                    declared: words * 2,
                    available: 4,
                });
            }
            NetworkValue::ProdInhibitUs { micros: cursor.read_u32_le()? }
        }
        NETWORK_SAFETY => {
            let len_offset = cursor.position();
            let words = usize::from(cursor.read_u8()?);
            if words == 0 {
                return Err(DecodeError::InconsistentLength {
                    offset: len_offset,
                    declared: 0,
                    available: cursor.remaining(),
                });
            }
            // The declared length covers the format byte and the body
            let segment = decode_safety_segment(cursor, words * 2, strict_safety)?;
            NetworkValue::Safety(segment)
        }
        NETWORK_EXTENDED => {
            let len_offset = cursor.position();
            let words = usize::from(cursor.read_u8()?);
            // The declared length includes the 2-byte subtype that follows
            if words == 0 {
                return Err(DecodeError::InconsistentLength {
                    offset: len_offset,
                    declared: 0,
                    available: cursor.remaining(),
                });
            }
            let subtype = cursor.read_u16_le()?;
            let data = cursor.take(words * 2 - 2)?.to_vec();
            NetworkValue::Extended { subtype, data }
        }
        other => {
            return Err(DecodeError::UnsupportedFormat {
                what: "network segment subtype",
                value: other,
                offset: tag_offset,
            })
        }
    };

    Ok(SegmentKind::Network(value))
}

fn decode_symbolic(
    cursor: &mut ByteCursor<'_>,
    tag: u8,
    start: usize,
) -> Result<SegmentKind, DecodeError> {
    let size = usize::from(tag & SYMBOLIC_SIZE_MASK);

    let value = if size > 0 {
        let bytes = cursor.take(size)?;
        SymbolicValue::Ascii(String::from_utf8_lossy(bytes).into_owned())
    } else {
        // Size 0 selects the extended string forms
        let format_offset = cursor.position();
        let format = cursor.read_u8()?;
        let count = usize::from(format & SYMBOLIC_SIZE_MASK);

        match format & SYMBOLIC_EXT_FORMAT_MASK {
            SYMBOLIC_EXT_DOUBLE => {
                let mut chars = Vec::with_capacity(count);
                for _ in 0..count {
                    chars.push(cursor.read_u16_le()?);
                }
                SymbolicValue::DoubleByte(chars)
            }
            SYMBOLIC_EXT_TRIPLE => SymbolicValue::TripleByte(cursor.take(count * 3)?.to_vec()),
            SYMBOLIC_EXT_NUMERIC => {
                let (width, value) = match format & SYMBOLIC_SIZE_MASK {
                    SYMBOLIC_NUMERIC_USINT => (NumericWidth::Usint, u32::from(cursor.read_u8()?)),
                    SYMBOLIC_NUMERIC_UINT => (NumericWidth::Uint, u32::from(cursor.read_u16_le()?)),
                    SYMBOLIC_NUMERIC_UDINT => (NumericWidth::Udint, cursor.read_u32_le()?),
                    other => {
                        return Err(DecodeError::UnsupportedFormat {
                            what: "numeric symbol type",
                            value: other,
                            offset: format_offset,
                        })
                    }
                };
                SymbolicValue::Numeric { width, value }
            }
            _ => {
                return Err(DecodeError::UnsupportedFormat {
                    what: "extended symbol format",
                    value: format,
                    offset: format_offset,
                })
            }
        }
    };

    // All symbolic forms pad to an even total segment length
    if (cursor.position() - start) % 2 != 0 {
        cursor.skip(1)?;
    }

    Ok(SegmentKind::Symbolic(value))
}

fn decode_data(
    cursor: &mut ByteCursor<'_>,
    tag: u8,
    start: usize,
) -> Result<SegmentKind, DecodeError> {
    let value = match tag & DATA_SUBTYPE_MASK {
        DATA_SIMPLE => {
            let words = usize::from(cursor.read_u8()?);
            DataValue::Simple(cursor.take(words * 2)?.to_vec())
        }
        DATA_ANSI_SYMBOL => {
            let len = usize::from(cursor.read_u8()?);
            let bytes = cursor.take(len)?;
            let symbol = String::from_utf8_lossy(bytes).into_owned();
            // Odd symbol lengths pad to an even segment total
            if (cursor.position() - start) % 2 != 0 {
                cursor.skip(1)?;
            }
            DataValue::AnsiExtendedSymbol(symbol)
        }
        other => {
            return Err(DecodeError::UnsupportedFormat {
                what: "data segment subtype",
                value: other,
                offset: start,
            })
        }
    };

    Ok(SegmentKind::Data(value))
}
