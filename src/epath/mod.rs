//! EPATH decoding
//!
//! EPATH is CIP's compact, self-describing binary addressing scheme. A path
//! is a sequence of tagged segments referencing classes, instances,
//! attributes, connection points, ports, symbols or raw data. This module
//! holds the segment data model and the path-level decoder; the per-segment
//! grammar lives in `segment`, with the Electronic Key and Safety Network
//! Segment sub-structures in their own files.

pub mod electronic_key;
pub mod safety;
mod segment;

use log::debug;
use serde::Serialize;

use crate::buffer::ByteCursor;
use crate::error::DecodeError;

pub use electronic_key::ElectronicKey;
pub use safety::SafetySegment;
pub use segment::decode_segment;

/// Addressing level selected by a Logical segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalKind {
    Class,
    Instance,
    Member,
    ConnectionPoint,
    Attribute,
    ServiceId,
    ExtendedLogical,
}

/// Encoded width of a Logical segment value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalWidth {
    Bits8,
    Bits16,
    Bits32,
}

/// Link address carried by a Port segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LinkAddress {
    /// Single numeric byte address
    Numeric(u8),
    /// Length-prefixed address bytes (e.g. an IP address string)
    Extended(Vec<u8>),
}

/// Body of a Network segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NetworkValue {
    Schedule { value: u8 },
    FixedTag { value: u8 },
    ProdInhibitMs { millis: u8 },
    ProdInhibitUs { micros: u32 },
    Safety(SafetySegment),
    Extended { subtype: u16, data: Vec<u8> },
}

/// Width selector of a numeric symbolic tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumericWidth {
    Usint,
    Uint,
    Udint,
}

/// Body of a Symbolic segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SymbolicValue {
    Ascii(String),
    DoubleByte(Vec<u16>),
    /// Three bytes per character, kept raw
    TripleByte(Vec<u8>),
    Numeric { width: NumericWidth, value: u32 },
}

/// Body of a Data segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DataValue {
    Simple(Vec<u8>),
    AnsiExtendedSymbol(String),
}

/// One decoded EPATH segment variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SegmentKind {
    Port {
        extended_link: bool,
        port_id: u16,
        link: LinkAddress,
    },
    Logical {
        kind: LogicalKind,
        width: LogicalWidth,
        value: u32,
        extended_type: Option<u8>,
    },
    /// Special-format Logical segment carrying a device identity key
    ElectronicKey(ElectronicKey),
    Network(NetworkValue),
    Symbolic(SymbolicValue),
    Data(DataValue),
}

/// One decoded segment together with its exact consumed byte length
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub encoded_len: usize,
}

/// Accumulated addressing of one EPATH decode
///
/// "Last value wins" for the current fields; the first Class, Instance and
/// Connection Point seen are remembered separately because a path may
/// legally repeat a segment kind and downstream consumers need the original
/// target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestPathInfo {
    pub class: Option<u32>,
    pub instance: Option<u32>,
    pub attribute: Option<u32>,
    pub connection_point: Option<u32>,
    pub member: Option<u32>,
    pub class_first: Option<u32>,
    pub instance_first: Option<u32>,
    pub connection_point_first: Option<u32>,
}

impl RequestPathInfo {
    fn apply(&mut self, kind: LogicalKind, value: u32) {
        match kind {
            LogicalKind::Class => {
                self.class = Some(value);
                self.class_first.get_or_insert(value);
            }
            LogicalKind::Instance => {
                self.instance = Some(value);
                self.instance_first.get_or_insert(value);
            }
            LogicalKind::ConnectionPoint => {
                self.connection_point = Some(value);
                self.connection_point_first.get_or_insert(value);
            }
            LogicalKind::Attribute => self.attribute = Some(value),
            LogicalKind::Member => self.member = Some(value),
            LogicalKind::ServiceId | LogicalKind::ExtendedLogical => {}
        }
    }

    /// True when the path addresses the class itself rather than an instance
    pub fn is_class_level(&self) -> bool {
        matches!(self.instance, None | Some(0))
    }
}

/// Result of decoding one complete EPATH
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedPath {
    pub segments: Vec<Segment>,
    pub info: RequestPathInfo,
    /// The Safety Network Segment, when the path carried one
    pub safety: Option<SafetySegment>,
    /// Payload of a Simple Data segment, when the path carried one
    pub simple_data: Option<Vec<u8>>,
}

impl DecodedPath {
    /// True when a Safety Network Segment was seen in this path
    pub fn safety_seen(&self) -> bool {
        self.safety.is_some()
    }

    /// True when a Simple Data segment was seen in this path
    pub fn has_simple_data(&self) -> bool {
        self.simple_data.is_some()
    }
}

/// Decode an EPATH of exactly `byte_len` bytes from the cursor
///
/// Segments are decoded until `byte_len` is consumed exactly; a segment
/// that would run past the declared length is an `InconsistentLength`
/// error, never a truncation to fit. Logical segments feed the
/// `RequestPathInfo` accumulator; Electronic Keys decode without touching
/// it.
pub fn decode_path(
    cursor: &mut ByteCursor<'_>,
    byte_len: usize,
    packed: bool,
    strict_safety: bool,
) -> Result<DecodedPath, DecodeError> {
    let mut range = cursor.sub_cursor(byte_len)?;
    let mut path = DecodedPath::default();

    while !range.is_empty() {
        let segment = decode_segment(&mut range, packed, strict_safety).map_err(|err| {
            // A segment crossing the declared path end is a structural
            // error of the path, not a short buffer
            match err {
                DecodeError::Truncated { offset, needed } => DecodeError::InconsistentLength {
                    offset,
                    declared: byte_len + needed,
                    available: byte_len,
                },
                other => other,
            }
        })?;

        match &segment.kind {
            SegmentKind::Logical { kind, value, .. } => path.info.apply(*kind, *value),
            SegmentKind::Network(NetworkValue::Safety(safety)) => {
                path.safety = Some(safety.clone());
            }
            SegmentKind::Data(DataValue::Simple(data)) => {
                path.simple_data = Some(data.clone());
            }
            _ => {}
        }

        path.segments.push(segment);
    }

    debug!(
        "Decoded EPATH: {} segment(s), class {:?}, instance {:?}",
        path.segments.len(),
        path.info.class,
        path.info.instance
    );
    Ok(path)
}
