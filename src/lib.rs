//! CIP message decoder core
//!
//! This library decodes Common Industrial Protocol (CIP) explicit messages
//! as carried over EtherNet/IP: the EPATH addressing grammar (port,
//! logical, network, symbolic, and data segments, including electronic
//! keys and CIP Safety network segments) and the Connection Manager
//! services that establish and tear down connections. A [`Session`] holds
//! the cross-message state of one capture stream, correlating responses to
//! requests and tracking connection lifecycles across Forward Open and
//! Forward Close exchanges.

pub mod buffer;
pub mod cm;
pub mod config;
pub mod epath;
pub mod error;
pub mod lookup;
pub mod session;
pub mod utils;

pub use config::DecoderConfig;
pub use error::DecodeError;
pub use lookup::MessageRef;
pub use session::{DecodedMessage, MessageContext, Session};
