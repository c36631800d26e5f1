//! Static CIP name tables and host-side collaborator interfaces
//!
//! The exhaustive vendor/device/class tables live in the consuming analysis
//! tool; this module carries only the immutable tables the decoder core
//! needs for its own log output, plus the narrow traits through which the
//! host supplies attribute/service metadata and generic service-body
//! decoding.

use serde::{Deserialize, Serialize};

use crate::epath::RequestPathInfo;

/// Reply bit: set in the service code of every CIP response
pub const SC_REPLY_MASK: u8 = 0x80;

/// Multiple Service Packet (Message Router object)
pub const SC_MULTIPLE_SERVICE: u8 = 0x0A;
/// Connection Manager: Forward Close
pub const SC_FORWARD_CLOSE: u8 = 0x4E;
/// Connection Manager: Unconnected Send
pub const SC_UNCONNECTED_SEND: u8 = 0x52;
/// Connection Manager: Forward Open
pub const SC_FORWARD_OPEN: u8 = 0x54;
/// Connection Manager: Large Forward Open (32-bit connection parameters)
pub const SC_LARGE_FORWARD_OPEN: u8 = 0x5B;

/// Connection Manager object class code
pub const CLASS_CONNECTION_MANAGER: u32 = 0x06;
/// Message Router object class code
pub const CLASS_MESSAGE_ROUTER: u32 = 0x02;

/// Name of a common or Connection Manager service code
pub fn service_name(service: u8) -> Option<&'static str> {
    match service & !SC_REPLY_MASK {
        0x01 => Some("Get Attributes All"),
        0x02 => Some("Set Attributes All"),
        0x03 => Some("Get Attribute List"),
        0x04 => Some("Set Attribute List"),
        0x05 => Some("Reset"),
        0x06 => Some("Start"),
        0x07 => Some("Stop"),
        0x08 => Some("Create"),
        0x09 => Some("Delete"),
        SC_MULTIPLE_SERVICE => Some("Multiple Service Packet"),
        0x0D => Some("Apply Attributes"),
        0x0E => Some("Get Attribute Single"),
        0x10 => Some("Set Attribute Single"),
        0x11 => Some("Find Next Object Instance"),
        0x15 => Some("Restore"),
        0x16 => Some("Save"),
        0x17 => Some("No Operation"),
        0x18 => Some("Get Member"),
        0x19 => Some("Set Member"),
        0x1A => Some("Insert Member"),
        0x1B => Some("Remove Member"),
        SC_FORWARD_CLOSE => Some("Forward Close"),
        SC_UNCONNECTED_SEND => Some("Unconnected Send"),
        SC_FORWARD_OPEN => Some("Forward Open"),
        SC_LARGE_FORWARD_OPEN => Some("Large Forward Open"),
        _ => None,
    }
}

/// Name of a CIP general status code
pub fn general_status_name(status: u8) -> Option<&'static str> {
    match status {
        0x00 => Some("Success"),
        0x01 => Some("Connection failure"),
        0x02 => Some("Resource unavailable"),
        0x03 => Some("Invalid parameter value"),
        0x04 => Some("Path segment error"),
        0x05 => Some("Path destination unknown"),
        0x06 => Some("Partial transfer"),
        0x07 => Some("Connection lost"),
        0x08 => Some("Service not supported"),
        0x09 => Some("Invalid attribute value"),
        0x0A => Some("Attribute list error"),
        0x0B => Some("Already in requested mode/state"),
        0x0C => Some("Object state conflict"),
        0x0D => Some("Object already exists"),
        0x0E => Some("Attribute not settable"),
        0x0F => Some("Privilege violation"),
        0x10 => Some("Device state conflict"),
        0x11 => Some("Reply data too large"),
        0x13 => Some("Not enough data"),
        0x14 => Some("Attribute not supported"),
        0x15 => Some("Too much data"),
        0x16 => Some("Object does not exist"),
        0x19 => Some("Store operation failure"),
        0x1F => Some("Vendor specific error"),
        0x20 => Some("Invalid parameter"),
        _ => None,
    }
}

/// Name of a well-known CIP object class
pub fn class_name(class: u32) -> Option<&'static str> {
    match class {
        0x01 => Some("Identity"),
        CLASS_MESSAGE_ROUTER => Some("Message Router"),
        0x04 => Some("Assembly"),
        0x05 => Some("Connection"),
        CLASS_CONNECTION_MANAGER => Some("Connection Manager"),
        0x37 => Some("File"),
        0x39 => Some("Safety Supervisor"),
        0x3A => Some("Safety Validator"),
        0xF3 => Some("Connection Configuration"),
        0xF4 => Some("Port"),
        0xF5 => Some("TCP/IP Interface"),
        0xF6 => Some("Ethernet Link"),
        _ => None,
    }
}

/// Stable identity of one captured message (e.g. a capture frame number)
///
/// Usable as a map key and totally ordered for "first seen" comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageRef(pub u64);

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute metadata supplied by the host's object tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
}

/// Service metadata supplied by the host's object tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
}

/// Host-side attribute/service table lookup, consulted by consumers of a
/// decoded request path
pub trait ObjectLookup {
    /// Look up attribute metadata; `class_level` is true when the path
    /// addresses the class itself rather than an instance
    fn lookup_attribute(
        &self,
        class: u32,
        class_level: bool,
        attribute: u32,
    ) -> Option<AttributeDescriptor>;

    /// Look up object-specific service metadata
    fn lookup_service(&self, class: u32, service: u8) -> Option<ServiceDescriptor>;
}

/// Result of the host's generic service-body decode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceBodyResult {
    /// Bytes of the body the host consumed
    pub consumed: usize,
    /// One-line summary for display, if the host produced one
    pub summary: Option<String>,
}

/// Hook through which the decoder hands generic (non-Connection-Manager)
/// service bodies back to the host
#[cfg_attr(test, mockall::automock)]
pub trait ServiceBodyDecoder {
    fn decode_service_body(
        &mut self,
        body: &[u8],
        path: &RequestPathInfo,
        is_request: bool,
    ) -> ServiceBodyResult;
}

/// No-op service body decoder for callers without host tables
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopServiceDecoder;

impl ServiceBodyDecoder for NoopServiceDecoder {
    fn decode_service_body(
        &mut self,
        body: &[u8],
        _path: &RequestPathInfo,
        _is_request: bool,
    ) -> ServiceBodyResult {
        ServiceBodyResult { consumed: body.len(), summary: None }
    }
}
