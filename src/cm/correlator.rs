//! Request/response correlation
//!
//! A CIP response carries no addressing, only a status and payload, so the
//! decoder remembers every request it sees and attaches the request's path
//! context to the matching response. Records persist for the life of the
//! capture: a later pass over the same frames must find the same state, and
//! re-processing a request must not create a duplicate entry.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::epath::RequestPathInfo;
use crate::lookup::MessageRef;

/// Identity a response is matched on: the transport-level channel and
/// sequence of the original request, the position within an embedding
/// message (if any), and the service code without its reply bit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequestKey {
    pub channel: u64,
    pub sequence: u64,
    /// Index path for services embedded in Multiple Service Packets or
    /// Unconnected Sends, outermost first
    pub embedded: Vec<u16>,
    /// Service code with the reply bit cleared
    pub service: u8,
}

/// Reference to a service embedded inside another message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddedServiceRef {
    pub parent: MessageRef,
    pub index: u16,
}

/// Correlation state of one pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Awaiting,
    Matched { response_ref: MessageRef },
}

/// One remembered request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRequest {
    pub key: RequestKey,
    pub service: u8,
    pub request_ref: MessageRef,
    pub state: RequestState,
    /// Addressing of the request, attached to the response's decode context
    pub path: RequestPathInfo,
    pub continuation: Option<EmbeddedServiceRef>,
}

/// Process-wide table of pending requests, keyed by request identity
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<RequestKey, PendingRequest>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a request. Insertion is idempotent: a key already present
    /// (a re-decoded frame) leaves the table unchanged.
    pub fn record_request(
        &mut self,
        key: RequestKey,
        request_ref: MessageRef,
        service: u8,
        path: RequestPathInfo,
        continuation: Option<EmbeddedServiceRef>,
    ) -> &PendingRequest {
        self.pending.entry(key.clone()).or_insert_with(|| {
            debug!("Recording request {} service 0x{:02x}", request_ref, service);
            PendingRequest {
                key,
                service,
                request_ref,
                state: RequestState::Awaiting,
                path,
                continuation,
            }
        })
    }

    /// Match a response against its stored request
    ///
    /// `key.service` must already have the reply bit cleared. On the first
    /// match the record transitions `Awaiting → Matched`; the forward entry
    /// is kept so later passes still resolve it. Returns `None` when no
    /// request was captured, in which case the caller decodes the response
    /// with generic rules only.
    pub fn match_response(
        &mut self,
        key: &RequestKey,
        response_ref: MessageRef,
    ) -> Option<&PendingRequest> {
        let record = self.pending.get_mut(key)?;
        if record.state == RequestState::Awaiting {
            debug!(
                "Matched response {} to request {}",
                response_ref, record.request_ref
            );
            record.state = RequestState::Matched { response_ref };
        }
        Some(&*record)
    }

    /// Read-only lookup, allowed regardless of pass number
    pub fn get(&self, key: &RequestKey) -> Option<&PendingRequest> {
        self.pending.get(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
