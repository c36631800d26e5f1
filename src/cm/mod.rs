//! Connection Manager data model
//!
//! Types shared by the correlation engine: the connection triad identity,
//! connection records and endpoints, network connection parameter
//! decomposition, and the derived safety-open classification.

pub mod correlator;
pub mod dispatch;
pub mod forward;
pub mod table;

use serde::Serialize;

use crate::epath::{RequestPathInfo, SafetySegment};
use crate::lookup::MessageRef;

/// Stable identity of one CIP connection across Forward Open and Forward
/// Close: equality of all three fields is the sole matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionTriad {
    pub connection_serial: u16,
    pub originator_vendor: u16,
    pub originator_serial: u32,
}

/// Lifecycle state of a connection record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Forward Open request parsed, response not yet seen
    Opening,
    /// Forward Open success response parsed, triad-verified
    Open,
    /// Forward Close (or unsuccessful open) referencing the triad parsed
    Closed,
}

/// Fixed vs variable connection size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeType {
    Fixed,
    Variable,
}

/// Connection type bits of the network connection parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionKind {
    Null,
    Multicast,
    PointToPoint,
    Reserved,
}

/// Which role the originator plays on the data connection, derived from
/// the transport class/trigger direction bit at Forward Open time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OriginatorRole {
    Producer,
    Consumer,
}

/// Decomposed network connection parameters (16-bit or 32-bit encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionParams {
    pub size: u32,
    pub size_type: SizeType,
    pub priority: u8,
    pub connection_type: ConnectionKind,
    pub redundant_owner: bool,
}

impl ConnectionParams {
    /// Decode the 16-bit parameter word of a Forward Open
    pub fn from_word(raw: u16) -> Self {
        Self {
            size: u32::from(raw & 0x01FF),
            size_type: if raw & 0x0200 != 0 { SizeType::Variable } else { SizeType::Fixed },
            priority: ((raw >> 10) & 0x03) as u8,
            connection_type: Self::kind_bits(((raw >> 13) & 0x03) as u8),
            redundant_owner: raw & 0x8000 != 0,
        }
    }

    /// Decode the 32-bit parameter dword of a Large Forward Open
    pub fn from_dword(raw: u32) -> Self {
        Self {
            size: raw & 0xFFFF,
            size_type: if raw & 0x0200_0000 != 0 { SizeType::Variable } else { SizeType::Fixed },
            priority: ((raw >> 26) & 0x03) as u8,
            connection_type: Self::kind_bits(((raw >> 29) & 0x03) as u8),
            redundant_owner: raw & 0x8000_0000 != 0,
        }
    }

    fn kind_bits(bits: u8) -> ConnectionKind {
        match bits {
            0 => ConnectionKind::Null,
            1 => ConnectionKind::Multicast,
            2 => ConnectionKind::PointToPoint,
            _ => ConnectionKind::Reserved,
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            size: 0,
            size_type: SizeType::Fixed,
            priority: 0,
            connection_type: ConnectionKind::Null,
            redundant_owner: false,
        }
    }
}

/// One direction of a connection (O→T or T→O)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionEndpoint {
    pub connection_id: u32,
    /// Requested packet interval in microseconds
    pub requested_packet_interval: u32,
    /// Actual packet interval from the success response, once seen
    pub actual_packet_interval: Option<u32>,
    pub params: ConnectionParams,
}

/// Derived classification of a safety Forward Open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SafetyOpenType {
    /// Connection path additionally carries a Simple Data segment
    /// ("open with configuration data")
    Type1,
    /// SCID present and non-zero
    Type2a,
    /// SCID present but all-zero (or the format carries none)
    Type2b,
}

/// Safety metadata retained on a connection record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyConnectionInfo {
    pub open_type: SafetyOpenType,
    pub segment: SafetySegment,
}

/// Classify a safety Forward Open from its connection path contents
///
/// Pure function of the safety segment and the simple-data flag: the
/// classification is derived, never transmitted, and recomputes identically
/// on every decode pass.
pub fn classify_safety_open(safety: &SafetySegment, has_simple_data: bool) -> SafetyOpenType {
    if has_simple_data {
        return SafetyOpenType::Type1;
    }
    match safety.scid() {
        Some(scid) if !scid.is_zero() => SafetyOpenType::Type2a,
        _ => SafetyOpenType::Type2b,
    }
}

/// Timeout multiplier selected by the 3-bit code of a Forward Open
///
/// Codes 0..=7 map to {4, 8, 16, 32, 64, 128, 256, 512}; anything else is
/// the explicit invalid value 0.
pub fn timeout_multiplier(code: u8) -> u32 {
    match code {
        0..=7 => 4u32 << code,
        _ => 0,
    }
}

/// Effective connection timeout in milliseconds
pub fn effective_timeout_ms(rpi_microseconds: u32, multiplier_code: u8) -> u64 {
    u64::from(rpi_microseconds / 1000) * u64::from(timeout_multiplier(multiplier_code))
}

/// One CIP connection as observed across Forward Open / Forward Close
///
/// Created half-populated from the Forward Open request; connection ids and
/// actual packet intervals are filled in (not replaced) by the matching
/// success response; retired by a Forward Close. Never deleted, since a
/// capture supports random re-access to earlier frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRecord {
    pub triad: ConnectionTriad,
    pub state: ConnectionState,
    pub o2t: ConnectionEndpoint,
    pub t2o: ConnectionEndpoint,
    pub transport_class_trigger: u8,
    pub originator_role: OriginatorRole,
    pub timeout_multiplier_code: u8,
    /// Derived from the O→T requested packet interval and the multiplier
    pub timeout_ms: u64,
    /// Both connection types were Null: a legal degenerate open, flagged
    /// for Forward Close correlation
    pub null_open: bool,
    pub safety: Option<SafetyConnectionInfo>,
    pub connection_path: RequestPathInfo,
    pub open_request_ref: Option<MessageRef>,
    pub open_response_ref: Option<MessageRef>,
    pub close_ref: Option<MessageRef>,
}

impl ConnectionRecord {
    /// Record for a Forward Close that arrived without any matching open
    pub fn closed_only(triad: ConnectionTriad, close_ref: MessageRef) -> Self {
        Self {
            triad,
            state: ConnectionState::Closed,
            o2t: ConnectionEndpoint::default(),
            t2o: ConnectionEndpoint::default(),
            transport_class_trigger: 0,
            originator_role: OriginatorRole::Producer,
            timeout_multiplier_code: 0,
            timeout_ms: 0,
            null_open: false,
            safety: None,
            connection_path: RequestPathInfo::default(),
            open_request_ref: None,
            open_response_ref: None,
            close_ref: Some(close_ref),
        }
    }

    /// Safety-open classification of this record, when it is a safety
    /// connection
    pub fn safety_open_type(&self) -> Option<SafetyOpenType> {
        self.safety.as_ref().map(|s| s.open_type)
    }
}

/// Direction bit of the transport class/trigger byte
pub fn originator_role(transport_class_trigger: u8) -> OriginatorRole {
    if transport_class_trigger & 0x80 != 0 {
        OriginatorRole::Consumer
    } else {
        OriginatorRole::Producer
    }
}
