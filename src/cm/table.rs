//! Connection table
//!
//! Tracks every CIP connection observed in the capture, keyed by the
//! connection triad. A triad may be reused after a close, so each triad
//! maps to the ordered list of records it identified over time; operations
//! act on the most recent record. Records are never deleted — a capture
//! supports random re-access to earlier frames — and every insertion is
//! idempotent, keyed by the frame that caused it.

use std::collections::HashMap;

use log::{debug, warn};

use crate::lookup::MessageRef;

use super::forward::{ForwardOpenRequest, ForwardOpenResponse};
use super::{
    classify_safety_open, effective_timeout_ms, originator_role, ConnectionEndpoint,
    ConnectionKind, ConnectionRecord, ConnectionState, ConnectionTriad, SafetyConnectionInfo,
    SafetyOpenType,
};

/// Table of all connections seen in one capture
#[derive(Debug, Default)]
pub struct ConnectionTable {
    records: HashMap<ConnectionTriad, Vec<ConnectionRecord>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Forward Open request: `NoRecord → Opening`
    ///
    /// Re-decoding the same frame finds the existing record and leaves the
    /// table unchanged.
    pub fn on_open_request(
        &mut self,
        request: &ForwardOpenRequest,
        frame: MessageRef,
    ) -> &ConnectionRecord {
        let records = self.records.entry(request.triad).or_default();

        let idx = match records.iter().position(|r| r.open_request_ref == Some(frame)) {
            Some(idx) => idx,
            None => {
                let null_open = request.o2t_params.connection_type == ConnectionKind::Null
                    && request.t2o_params.connection_type == ConnectionKind::Null;
                if null_open {
                    debug!("Null Forward Open for {:?}", request.triad);
                }

                let safety = request.connection_path.safety.as_ref().map(|segment| {
                    let open_type =
                        classify_safety_open(segment, request.connection_path.has_simple_data());
                    SafetyConnectionInfo { open_type, segment: segment.clone() }
                });

                records.push(ConnectionRecord {
                    triad: request.triad,
                    state: ConnectionState::Opening,
                    o2t: ConnectionEndpoint {
                        connection_id: request.o2t_connection_id,
                        requested_packet_interval: request.o2t_rpi,
                        actual_packet_interval: None,
                        params: request.o2t_params,
                    },
                    t2o: ConnectionEndpoint {
                        connection_id: request.t2o_connection_id,
                        requested_packet_interval: request.t2o_rpi,
                        actual_packet_interval: None,
                        params: request.t2o_params,
                    },
                    transport_class_trigger: request.transport_class_trigger,
                    originator_role: originator_role(request.transport_class_trigger),
                    timeout_multiplier_code: request.timeout_multiplier_code,
                    timeout_ms: effective_timeout_ms(
                        request.o2t_rpi,
                        request.timeout_multiplier_code,
                    ),
                    null_open,
                    safety,
                    connection_path: request.connection_path.info.clone(),
                    open_request_ref: Some(frame),
                    open_response_ref: None,
                    close_ref: None,
                });
                records.len() - 1
            }
        };
        &records[idx]
    }

    /// Apply a Forward Open success response: `Opening → Open`,
    /// triad-verified
    ///
    /// The connection ids and actual packet intervals of the stored record
    /// are updated in place, not replaced. A record that already carries
    /// this frame is returned unchanged, so a re-decode never touches a
    /// later record of a reused triad. Returns `None` when the open request
    /// was not captured.
    pub fn on_open_response(
        &mut self,
        response: &ForwardOpenResponse,
        frame: MessageRef,
    ) -> Option<&ConnectionRecord> {
        let records = self.records.get_mut(&response.triad)?;

        let idx = match records.iter().position(|r| r.open_response_ref == Some(frame)) {
            Some(idx) => idx,
            None => {
                let idx = records
                    .iter()
                    .rposition(|r| r.state == ConnectionState::Opening)?;
                let record = &mut records[idx];
                record.o2t.connection_id = response.o2t_connection_id;
                record.t2o.connection_id = response.t2o_connection_id;
                record.o2t.actual_packet_interval = Some(response.o2t_api);
                record.t2o.actual_packet_interval = Some(response.t2o_api);
                record.open_response_ref = Some(frame);
                record.state = ConnectionState::Open;
                debug!("Connection {:?} open, frame {}", response.triad, frame);
                idx
            }
        };
        Some(&records[idx])
    }

    /// Apply an unsuccessful Forward Open response: the pending record is
    /// retired without ever becoming `Open`
    ///
    /// A record already retired by this frame is returned unchanged.
    pub fn on_open_error(
        &mut self,
        triad: ConnectionTriad,
        frame: MessageRef,
    ) -> Option<&ConnectionRecord> {
        let records = self.records.get_mut(&triad)?;

        let idx = match records.iter().position(|r| r.close_ref == Some(frame)) {
            Some(idx) => idx,
            None => {
                let idx = records
                    .iter()
                    .rposition(|r| r.state == ConnectionState::Opening)?;
                records[idx].state = ConnectionState::Closed;
                records[idx].close_ref = Some(frame);
                idx
            }
        };
        Some(&records[idx])
    }

    /// Apply a Forward Close referencing `triad`: `Opening/Open → Closed`
    ///
    /// A record already closed by this frame is returned unchanged, so
    /// re-decoding a close frame after the triad was reused leaves the
    /// newer records alone. A close with no matching record still records
    /// the triad (the open may simply not have been captured) as a
    /// closed-only record.
    pub fn on_close(&mut self, triad: ConnectionTriad, frame: MessageRef) -> &ConnectionRecord {
        let records = self.records.entry(triad).or_default();

        let idx = match records.iter().position(|r| r.close_ref == Some(frame)) {
            Some(idx) => idx,
            None => match records.iter().rposition(|r| r.state != ConnectionState::Closed) {
                Some(idx) => {
                    records[idx].state = ConnectionState::Closed;
                    records[idx].close_ref = Some(frame);
                    debug!("Connection {:?} closed, frame {}", triad, frame);
                    idx
                }
                None if records.is_empty() => {
                    warn!(
                        "Forward Close for unknown connection {:?}, frame {}",
                        triad, frame
                    );
                    records.push(ConnectionRecord::closed_only(triad, frame));
                    0
                }
                // Close response after its own request: everything is
                // already closed, the triad stays recorded as-is
                None => records.len() - 1,
            },
        };
        &records[idx]
    }

    /// All records ever observed for a triad, oldest first
    pub fn get(&self, triad: &ConnectionTriad) -> Option<&[ConnectionRecord]> {
        self.records.get(triad).map(Vec::as_slice)
    }

    /// Most recent record for a triad
    pub fn latest(&self, triad: &ConnectionTriad) -> Option<&ConnectionRecord> {
        self.records.get(triad).and_then(|records| records.last())
    }

    /// Number of distinct triads seen
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Safety-open classification of the most recent record for a triad
    pub fn safety_open_type(&self, triad: &ConnectionTriad) -> Option<SafetyOpenType> {
        self.latest(triad).and_then(ConnectionRecord::safety_open_type)
    }
}
