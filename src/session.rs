//! Per-capture decode session
//!
//! A `Session` owns the cross-message state of one input stream: the
//! request correlator and the connection table. It is constructed once per
//! capture and passed by reference to every decode call, so state stays
//! visible across messages without hidden globals and resets with the
//! stream. Messages may be decoded more than once (re-rendering a capture);
//! all table insertions are keyed by message identity and idempotent.

use log::debug;
use serde::Serialize;

use crate::buffer::ByteCursor;
use crate::cm::correlator::{EmbeddedServiceRef, RequestCorrelator, RequestKey};
use crate::cm::dispatch::{dispatch, read_offset_table};
use crate::cm::forward::{
    decode_forward_close_request, decode_forward_close_response, decode_forward_open_error,
    decode_forward_open_request, decode_forward_open_response, ForwardCloseRequest,
    ForwardCloseResponse, ForwardOpenErrorResponse, ForwardOpenRequest, ForwardOpenResponse,
};
use crate::cm::table::ConnectionTable;
use crate::config::DecoderConfig;
use crate::epath::{decode_path, DecodedPath};
use crate::error::DecodeError;
use crate::lookup::{
    general_status_name, service_name, MessageRef, ServiceBodyDecoder, ServiceBodyResult,
    CLASS_CONNECTION_MANAGER, SC_FORWARD_CLOSE, SC_FORWARD_OPEN, SC_LARGE_FORWARD_OPEN,
    SC_MULTIPLE_SERVICE, SC_REPLY_MASK, SC_UNCONNECTED_SEND,
};

/// Identity of one message handed to the decoder
///
/// `channel` and `sequence` come from the transport (e.g. TCP stream id and
/// encapsulation sequence); `embedded` is the index path of a service
/// nested inside Multiple Service Packets or Unconnected Sends, outermost
/// first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub message_ref: MessageRef,
    pub channel: u64,
    pub sequence: u64,
    pub embedded: Vec<u16>,
}

impl MessageContext {
    pub fn new(message_ref: MessageRef, channel: u64, sequence: u64) -> Self {
        Self { message_ref, channel, sequence, embedded: Vec::new() }
    }

    /// Context of the embedded service at `index` within this message
    fn child(&self, index: u16) -> Self {
        let mut embedded = self.embedded.clone();
        embedded.push(index);
        Self { embedded, ..self.clone() }
    }

    fn request_key(&self, service: u8) -> RequestKey {
        RequestKey {
            channel: self.channel,
            sequence: self.sequence,
            embedded: self.embedded.clone(),
            service: service & !SC_REPLY_MASK,
        }
    }

    fn continuation(&self) -> Option<EmbeddedServiceRef> {
        self.embedded
            .last()
            .map(|&index| EmbeddedServiceRef { parent: self.message_ref, index })
    }
}

/// Status words of a CIP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseStatus {
    pub general_status: u8,
    pub additional_status: Vec<u16>,
}

impl ResponseStatus {
    pub fn is_success(&self) -> bool {
        self.general_status == 0
    }

    pub fn name(&self) -> Option<&'static str> {
        general_status_name(self.general_status)
    }
}

/// Outcome of decoding one embedded sub-message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServiceOutcome {
    Decoded(DecodedMessage),
    Failed(DecodeError),
}

impl ServiceOutcome {
    pub fn as_decoded(&self) -> Option<&DecodedMessage> {
        match self {
            ServiceOutcome::Decoded(message) => Some(message),
            ServiceOutcome::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&DecodeError> {
        match self {
            ServiceOutcome::Failed(err) => Some(err),
            ServiceOutcome::Decoded(_) => None,
        }
    }
}

impl From<Result<DecodedMessage, DecodeError>> for ServiceOutcome {
    fn from(result: Result<DecodedMessage, DecodeError>) -> Self {
        match result {
            Ok(message) => ServiceOutcome::Decoded(message),
            Err(err) => ServiceOutcome::Failed(err),
        }
    }
}

/// Decoded Unconnected Send request wrapper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnconnectedSend {
    pub priority_tick: u8,
    pub timeout_ticks: u8,
    pub embedded: Box<ServiceOutcome>,
    pub route_path: DecodedPath,
}

/// Service-specific payload of a decoded message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageBody {
    ForwardOpenRequest(ForwardOpenRequest),
    ForwardOpenReply(ForwardOpenResponse),
    ForwardOpenError(ForwardOpenErrorResponse),
    ForwardCloseRequest(ForwardCloseRequest),
    ForwardCloseReply(ForwardCloseResponse),
    UnconnectedSend(UnconnectedSend),
    MultipleService(Vec<ServiceOutcome>),
    /// Anything else: handed to the host's service-body hook
    Generic(ServiceBodyResult),
}

/// One fully decoded CIP message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    pub message_ref: MessageRef,
    pub service: u8,
    pub service_name: Option<&'static str>,
    pub is_response: bool,
    /// Request path; responses carry no addressing
    pub path: Option<DecodedPath>,
    pub status: Option<ResponseStatus>,
    /// The request this response was correlated to, when one was captured
    pub matched_request: Option<MessageRef>,
    pub body: MessageBody,
}

/// Cross-message decode state of one capture stream
#[derive(Debug, Default)]
pub struct Session {
    config: DecoderConfig,
    correlator: RequestCorrelator,
    connections: ConnectionTable,
}

impl Session {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config, correlator: RequestCorrelator::new(), connections: ConnectionTable::new() }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    /// Decode one Message Router request or response PDU
    ///
    /// A failed decode aborts only this message; previously committed
    /// session state stays intact for subsequent messages.
    pub fn decode_message(
        &mut self,
        ctx: &MessageContext,
        data: &[u8],
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<DecodedMessage, DecodeError> {
        self.decode_with_depth(ctx, data, self.config.max_recursion_depth, hook)
    }

    fn decode_with_depth(
        &mut self,
        ctx: &MessageContext,
        data: &[u8],
        depth: usize,
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<DecodedMessage, DecodeError> {
        if depth == 0 {
            return Err(DecodeError::RecursionLimitExceeded);
        }

        let mut cursor = ByteCursor::new(data);
        let service = cursor.read_u8()?;
        debug!(
            "Decoding {} service 0x{:02x} ({})",
            ctx.message_ref,
            service,
            service_name(service).unwrap_or("unknown")
        );

        if service & SC_REPLY_MASK != 0 {
            self.decode_response(ctx, cursor, service, depth, hook)
        } else {
            self.decode_request(ctx, cursor, service, depth, hook)
        }
    }

    fn decode_request(
        &mut self,
        ctx: &MessageContext,
        mut cursor: ByteCursor<'_>,
        service: u8,
        depth: usize,
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<DecodedMessage, DecodeError> {
        let strict = self.config.strict_safety_format;
        let path_words = usize::from(cursor.read_u8()?);
        let path = decode_path(&mut cursor, path_words * 2, false, strict)?;

        self.correlator.record_request(
            ctx.request_key(service),
            ctx.message_ref,
            service,
            path.info.clone(),
            ctx.continuation(),
        );

        let to_connection_manager = path.info.class == Some(CLASS_CONNECTION_MANAGER);
        let body = match service {
            SC_FORWARD_OPEN | SC_LARGE_FORWARD_OPEN if to_connection_manager => {
                let request = decode_forward_open_request(
                    &mut cursor,
                    service == SC_LARGE_FORWARD_OPEN,
                    strict,
                )?;
                self.connections.on_open_request(&request, ctx.message_ref);
                MessageBody::ForwardOpenRequest(request)
            }
            SC_FORWARD_CLOSE if to_connection_manager => {
                let request = decode_forward_close_request(&mut cursor, strict)?;
                self.connections.on_close(request.triad, ctx.message_ref);
                MessageBody::ForwardCloseRequest(request)
            }
            SC_UNCONNECTED_SEND if to_connection_manager => {
                MessageBody::UnconnectedSend(self.decode_unconnected_send(
                    ctx,
                    &mut cursor,
                    depth,
                    hook,
                )?)
            }
            SC_MULTIPLE_SERVICE => {
                MessageBody::MultipleService(self.decode_multiple_service(
                    ctx,
                    &mut cursor,
                    depth,
                    hook,
                )?)
            }
            _ => MessageBody::Generic(hook.decode_service_body(
                cursor.take_remaining(),
                &path.info,
                true,
            )),
        };

        Ok(DecodedMessage {
            message_ref: ctx.message_ref,
            service,
            service_name: service_name(service),
            is_response: false,
            path: Some(path),
            status: None,
            matched_request: None,
            body,
        })
    }

    fn decode_response(
        &mut self,
        ctx: &MessageContext,
        mut cursor: ByteCursor<'_>,
        service: u8,
        depth: usize,
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<DecodedMessage, DecodeError> {
        cursor.skip(1)?; // reserved
        let general_status = cursor.read_u8()?;
        let additional_words = usize::from(cursor.read_u8()?);
        let mut additional_status = Vec::with_capacity(additional_words);
        for _ in 0..additional_words {
            additional_status.push(cursor.read_u16_le()?);
        }
        let status = ResponseStatus { general_status, additional_status };

        // The response PDU carries no addressing; attach the stored request
        // context when one was captured, otherwise fall back to generic
        // service-table rules only
        let matched = self
            .correlator
            .match_response(&ctx.request_key(service), ctx.message_ref)
            .cloned();
        let matched_request = matched.as_ref().map(|request| request.request_ref);
        let request_path =
            matched.map(|request| request.path).unwrap_or_default();

        let body = match service & !SC_REPLY_MASK {
            SC_FORWARD_OPEN | SC_LARGE_FORWARD_OPEN => {
                if status.is_success() {
                    let response = decode_forward_open_response(&mut cursor)?;
                    self.connections.on_open_response(&response, ctx.message_ref);
                    MessageBody::ForwardOpenReply(response)
                } else {
                    let response = decode_forward_open_error(&mut cursor)?;
                    self.connections.on_open_error(response.triad, ctx.message_ref);
                    MessageBody::ForwardOpenError(response)
                }
            }
            SC_FORWARD_CLOSE if status.is_success() => {
                let response = decode_forward_close_response(&mut cursor)?;
                self.connections.on_close(response.triad, ctx.message_ref);
                MessageBody::ForwardCloseReply(response)
            }
            SC_MULTIPLE_SERVICE if status.is_success() => {
                MessageBody::MultipleService(self.decode_multiple_service(
                    ctx,
                    &mut cursor,
                    depth,
                    hook,
                )?)
            }
            _ => MessageBody::Generic(hook.decode_service_body(
                cursor.take_remaining(),
                &request_path,
                false,
            )),
        };

        Ok(DecodedMessage {
            message_ref: ctx.message_ref,
            service,
            service_name: service_name(service),
            is_response: true,
            path: None,
            status: Some(status),
            matched_request,
            body,
        })
    }

    fn decode_unconnected_send(
        &mut self,
        ctx: &MessageContext,
        cursor: &mut ByteCursor<'_>,
        depth: usize,
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<UnconnectedSend, DecodeError> {
        let priority_tick = cursor.read_u8()?;
        let timeout_ticks = cursor.read_u8()?;

        let embedded_len = usize::from(cursor.read_u16_le()?);
        let embedded_bytes = cursor.take(embedded_len)?;
        if embedded_len % 2 != 0 {
            cursor.skip(1)?; // pad to even
        }

        let route_words = usize::from(cursor.read_u8()?);
        cursor.skip(1)?; // reserved
        let route_path =
            decode_path(cursor, route_words * 2, false, self.config.strict_safety_format)?;

        // The embedded message decodes with its own correlator entry; its
        // failure is reported in place without failing the carrier
        let embedded = ServiceOutcome::from(self.decode_with_depth(
            &ctx.child(0),
            embedded_bytes,
            depth - 1,
            hook,
        ));

        Ok(UnconnectedSend {
            priority_tick,
            timeout_ticks,
            embedded: Box::new(embedded),
            route_path,
        })
    }

    fn decode_multiple_service(
        &mut self,
        ctx: &MessageContext,
        cursor: &mut ByteCursor<'_>,
        depth: usize,
        hook: &mut dyn ServiceBodyDecoder,
    ) -> Result<Vec<ServiceOutcome>, DecodeError> {
        // Offsets are relative to the start of the count field
        let region = cursor.take_remaining();
        let mut table_cursor = ByteCursor::new(region);
        let offsets = read_offset_table(&mut table_cursor)?;

        let results = dispatch(region, &offsets, |index, bytes| {
            self.decode_with_depth(&ctx.child(index), bytes, depth - 1, hook)
        });

        Ok(results.into_iter().map(ServiceOutcome::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cm::forward::tests_support::{
        close_request_body, open_response_body, OpenRequestBuilder,
    };
    use crate::cm::{ConnectionState, ConnectionTriad};
    use crate::lookup::{MockServiceBodyDecoder, NoopServiceDecoder};

    const CM_PATH: [u8; 4] = [0x20, 0x06, 0x24, 0x01];

    fn triad() -> ConnectionTriad {
        ConnectionTriad {
            connection_serial: 0x0042,
            originator_vendor: 0x004D,
            originator_serial: 0xCAFE0001,
        }
    }

    fn mr_request(service: u8, path: &[u8], body: &[u8]) -> Vec<u8> {
        let mut message = vec![service, (path.len() / 2) as u8];
        message.extend_from_slice(path);
        message.extend_from_slice(body);
        message
    }

    fn mr_response(service: u8, status: u8, body: &[u8]) -> Vec<u8> {
        let mut message = vec![service | SC_REPLY_MASK, 0x00, status, 0x00];
        message.extend_from_slice(body);
        message
    }

    fn ctx(frame: u64, sequence: u64) -> MessageContext {
        MessageContext::new(MessageRef(frame), 1, sequence)
    }

    #[test]
    fn test_forward_open_round_trip() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        // Forward Open request with placeholder connection ids
        let open_body = OpenRequestBuilder::new(triad()).build();
        let request = mr_request(SC_FORWARD_OPEN, &CM_PATH, &open_body);
        let decoded = session.decode_message(&ctx(10, 1), &request, &mut hook).unwrap();
        assert!(matches!(decoded.body, MessageBody::ForwardOpenRequest(_)));

        // Success response assigns the real connection ids
        let response_body = open_response_body(triad(), 0xAAAA_0001, 0xBBBB_0002);
        let response = mr_response(SC_FORWARD_OPEN, 0, &response_body);
        let decoded = session.decode_message(&ctx(11, 1), &response, &mut hook).unwrap();
        assert_eq!(decoded.matched_request, Some(MessageRef(10)));
        assert!(matches!(decoded.body, MessageBody::ForwardOpenReply(_)));

        let record = session.connections().latest(&triad()).unwrap();
        assert_eq!(record.state, ConnectionState::Open);
        assert_eq!(record.o2t.connection_id, 0xAAAA_0001);
        assert_eq!(record.t2o.connection_id, 0xBBBB_0002);

        // Forward Close retires the record
        let close = mr_request(SC_FORWARD_CLOSE, &CM_PATH, &close_request_body(triad()));
        session.decode_message(&ctx(20, 2), &close, &mut hook).unwrap();

        let record = session.connections().latest(&triad()).unwrap();
        assert_eq!(record.state, ConnectionState::Closed);
        assert_eq!(record.close_ref, Some(MessageRef(20)));
        assert_eq!(record.o2t.connection_id, 0xAAAA_0001);
        assert_eq!(record.t2o.connection_id, 0xBBBB_0002);
    }

    #[test]
    fn test_redecoding_frames_does_not_duplicate_state() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let open_body = OpenRequestBuilder::new(triad()).build();
        let request = mr_request(SC_FORWARD_OPEN, &CM_PATH, &open_body);
        session.decode_message(&ctx(10, 1), &request, &mut hook).unwrap();
        // Second pass over the same frame
        session.decode_message(&ctx(10, 1), &request, &mut hook).unwrap();

        assert_eq!(session.connections().get(&triad()).unwrap().len(), 1);
        assert_eq!(session.correlator().len(), 1);
    }

    #[test]
    fn test_failed_open_never_becomes_open() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let open_body = OpenRequestBuilder::new(triad()).build();
        let request = mr_request(SC_FORWARD_OPEN, &CM_PATH, &open_body);
        session.decode_message(&ctx(10, 1), &request, &mut hook).unwrap();

        // Error response: triad echo + remaining path size + reserved
        let mut error_body = Vec::new();
        error_body.extend_from_slice(&triad().connection_serial.to_le_bytes());
        error_body.extend_from_slice(&triad().originator_vendor.to_le_bytes());
        error_body.extend_from_slice(&triad().originator_serial.to_le_bytes());
        error_body.extend_from_slice(&[0x00, 0x00]);
        let response = mr_response(SC_FORWARD_OPEN, 0x01, &error_body);
        let decoded = session.decode_message(&ctx(11, 1), &response, &mut hook).unwrap();

        assert!(matches!(decoded.body, MessageBody::ForwardOpenError(_)));
        assert_eq!(
            session.connections().latest(&triad()).unwrap().state,
            ConnectionState::Closed
        );
    }

    #[test]
    fn test_unmatched_response_decodes_generically() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let response = mr_response(0x0E, 0, &[0x01, 0x02]);
        let decoded = session.decode_message(&ctx(5, 9), &response, &mut hook).unwrap();

        assert_eq!(decoded.matched_request, None);
        assert_eq!(decoded.status.as_ref().map(ResponseStatus::is_success), Some(true));
        assert!(matches!(decoded.body, MessageBody::Generic(_)));
    }

    #[test]
    fn test_response_inherits_request_path_context() {
        let mut session = Session::default();
        let mut hook = MockServiceBodyDecoder::new();
        hook.expect_decode_service_body()
            .withf(|_, path, is_request| {
                // Request pass sees the live path, response pass the stored one
                path.class == Some(0x01) && path.attribute == Some(0x07)
                    || *is_request
            })
            .times(2)
            .returning(|body, _, _| ServiceBodyResult { consumed: body.len(), summary: None });

        // Get Attribute Single of Identity attribute 7
        let request = mr_request(0x0E, &[0x20, 0x01, 0x24, 0x01, 0x30, 0x07], &[]);
        session.decode_message(&ctx(1, 4), &request, &mut hook).unwrap();

        let response = mr_response(0x0E, 0, &[0x99]);
        let decoded = session.decode_message(&ctx(2, 4), &response, &mut hook).unwrap();
        assert_eq!(decoded.matched_request, Some(MessageRef(1)));
    }

    #[test]
    fn test_multiple_service_packet_dispatches_each_range() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        // Two embedded Get Attribute Single requests
        let embedded = mr_request(0x0E, &[0x20, 0x01, 0x24, 0x01], &[]);
        assert_eq!(embedded.len(), 6);

        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes()); // count
        body.extend_from_slice(&6u16.to_le_bytes()); // offset of service 0
        body.extend_from_slice(&12u16.to_le_bytes()); // offset of service 1
        body.extend_from_slice(&embedded);
        body.extend_from_slice(&embedded);

        let message = mr_request(SC_MULTIPLE_SERVICE, &[0x20, 0x02, 0x24, 0x01], &body);
        let decoded = session.decode_message(&ctx(30, 7), &message, &mut hook).unwrap();

        let outcomes = match decoded.body {
            MessageBody::MultipleService(outcomes) => outcomes,
            other => panic!("expected multiple service body, got {:?}", other),
        };
        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            let message = outcome.as_decoded().expect("embedded decode failed");
            assert_eq!(message.service, 0x0E);
        }
        // Each embedded service has its own correlator entry, plus the
        // carrier itself
        assert_eq!(session.correlator().len(), 3);
    }

    #[test]
    fn test_multiple_service_bad_offset_is_isolated() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let embedded = mr_request(0x0E, &[0x20, 0x01, 0x24, 0x01], &[]);

        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&200u16.to_le_bytes()); // beyond the region
        body.extend_from_slice(&6u16.to_le_bytes());
        body.extend_from_slice(&embedded);

        let message = mr_request(SC_MULTIPLE_SERVICE, &[0x20, 0x02, 0x24, 0x01], &body);
        let decoded = session.decode_message(&ctx(31, 8), &message, &mut hook).unwrap();

        let outcomes = match decoded.body {
            MessageBody::MultipleService(outcomes) => outcomes,
            other => panic!("expected multiple service body, got {:?}", other),
        };
        assert!(outcomes[0].as_failed().is_some());
        // The sibling after the bad offset still decodes
        assert!(outcomes[1].as_decoded().is_some());
    }

    fn unconnected_send_wrapping(inner: &[u8]) -> Vec<u8> {
        let mut body = vec![0x0A, 0xF0]; // priority/tick, timeout ticks
        body.extend_from_slice(&(inner.len() as u16).to_le_bytes());
        body.extend_from_slice(inner);
        if inner.len() % 2 != 0 {
            body.push(0x00);
        }
        body.push(1); // route path words
        body.push(0); // reserved
        body.extend_from_slice(&[0x01, 0x00]); // port 1, link 0
        mr_request(SC_UNCONNECTED_SEND, &CM_PATH, &body)
    }

    #[test]
    fn test_unconnected_send_recurses_into_payload() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let open_body = OpenRequestBuilder::new(triad()).build();
        let inner = mr_request(SC_FORWARD_OPEN, &CM_PATH, &open_body);
        let message = unconnected_send_wrapping(&inner);

        let decoded = session.decode_message(&ctx(40, 3), &message, &mut hook).unwrap();
        let send = match decoded.body {
            MessageBody::UnconnectedSend(send) => send,
            other => panic!("expected unconnected send body, got {:?}", other),
        };
        let embedded = send.embedded.as_decoded().expect("embedded decode failed");
        assert!(matches!(embedded.body, MessageBody::ForwardOpenRequest(_)));

        // The embedded Forward Open reached the connection table
        assert_eq!(
            session.connections().latest(&triad()).unwrap().state,
            ConnectionState::Opening
        );
    }

    #[test]
    fn test_recursion_limit_fails_closed() {
        let config = DecoderConfig { max_recursion_depth: 2, ..Default::default() };
        let mut session = Session::new(config);
        let mut hook = NoopServiceDecoder;

        // Three levels of nesting against a depth budget of two
        let innermost = mr_request(0x0E, &[0x20, 0x01, 0x24, 0x01], &[]);
        let middle = unconnected_send_wrapping(&innermost);
        let message = unconnected_send_wrapping(&middle);

        let decoded = session.decode_message(&ctx(50, 5), &message, &mut hook).unwrap();
        let send = match decoded.body {
            MessageBody::UnconnectedSend(send) => send,
            other => panic!("expected unconnected send body, got {:?}", other),
        };
        let middle = send.embedded.as_decoded().expect("first nesting level fits");
        let inner_send = match &middle.body {
            MessageBody::UnconnectedSend(send) => send,
            other => panic!("expected nested unconnected send, got {:?}", other),
        };
        assert_eq!(
            inner_send.embedded.as_failed(),
            Some(&DecodeError::RecursionLimitExceeded)
        );
    }

    #[test]
    fn test_malformed_message_leaves_session_usable() {
        let mut session = Session::default();
        let mut hook = NoopServiceDecoder;

        let open_body = OpenRequestBuilder::new(triad()).build();
        let request = mr_request(SC_FORWARD_OPEN, &CM_PATH, &open_body);
        session.decode_message(&ctx(10, 1), &request, &mut hook).unwrap();

        // Truncated garbage fails its own decode only
        assert!(session.decode_message(&ctx(11, 2), &[0x54, 0x08], &mut hook).is_err());

        // Earlier state is intact and later messages keep decoding
        let response_body = open_response_body(triad(), 1, 2);
        let response = mr_response(SC_FORWARD_OPEN, 0, &response_body);
        session.decode_message(&ctx(12, 1), &response, &mut hook).unwrap();
        assert_eq!(
            session.connections().latest(&triad()).unwrap().state,
            ConnectionState::Open
        );
    }
}
