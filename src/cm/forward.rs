//! Forward Open / Forward Close body decoders
//!
//! Wire layouts of the Connection Manager open and close services, request
//! and response sides. The Large Forward Open differs from the Forward Open
//! only in carrying 32-bit network connection parameter words.

use serde::Serialize;

use crate::buffer::ByteCursor;
use crate::epath::{decode_path, DecodedPath};
use crate::error::DecodeError;

use super::{ConnectionParams, ConnectionTriad};

/// Decoded Forward Open (or Large Forward Open) request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardOpenRequest {
    pub priority_tick: u8,
    pub timeout_ticks: u8,
    pub o2t_connection_id: u32,
    pub t2o_connection_id: u32,
    pub triad: ConnectionTriad,
    pub timeout_multiplier_code: u8,
    /// O→T requested packet interval, microseconds
    pub o2t_rpi: u32,
    pub o2t_params: ConnectionParams,
    /// T→O requested packet interval, microseconds
    pub t2o_rpi: u32,
    pub t2o_params: ConnectionParams,
    pub transport_class_trigger: u8,
    pub connection_path: DecodedPath,
    /// True for the Large Forward Open encoding
    pub large: bool,
}

/// Decoded Forward Open success response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardOpenResponse {
    pub o2t_connection_id: u32,
    pub t2o_connection_id: u32,
    pub triad: ConnectionTriad,
    /// O→T actual packet interval, microseconds
    pub o2t_api: u32,
    /// T→O actual packet interval, microseconds
    pub t2o_api: u32,
    pub application_reply: Vec<u8>,
}

/// Decoded unsuccessful Forward Open response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForwardOpenErrorResponse {
    pub triad: ConnectionTriad,
    pub remaining_path_size: u8,
}

/// Decoded Forward Close request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardCloseRequest {
    pub priority_tick: u8,
    pub timeout_ticks: u8,
    pub triad: ConnectionTriad,
    pub connection_path: DecodedPath,
}

/// Decoded Forward Close success response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardCloseResponse {
    pub triad: ConnectionTriad,
    pub application_reply: Vec<u8>,
}

fn decode_triad(cursor: &mut ByteCursor<'_>) -> Result<ConnectionTriad, DecodeError> {
    Ok(ConnectionTriad {
        connection_serial: cursor.read_u16_le()?,
        originator_vendor: cursor.read_u16_le()?,
        originator_serial: cursor.read_u32_le()?,
    })
}

/// Decode a Forward Open request body; `large` selects the 32-bit
/// parameter encoding of the Large Forward Open
pub fn decode_forward_open_request(
    cursor: &mut ByteCursor<'_>,
    large: bool,
    strict_safety: bool,
) -> Result<ForwardOpenRequest, DecodeError> {
    let priority_tick = cursor.read_u8()?;
    let timeout_ticks = cursor.read_u8()?;
    let o2t_connection_id = cursor.read_u32_le()?;
    let t2o_connection_id = cursor.read_u32_le()?;
    let triad = decode_triad(cursor)?;
    let timeout_multiplier_code = cursor.read_u8()?;
    cursor.skip(3)?; // reserved

    let o2t_rpi = cursor.read_u32_le()?;
    let o2t_params = read_params(cursor, large)?;
    let t2o_rpi = cursor.read_u32_le()?;
    let t2o_params = read_params(cursor, large)?;

    let transport_class_trigger = cursor.read_u8()?;
    let path_words = usize::from(cursor.read_u8()?);
    let connection_path = decode_path(cursor, path_words * 2, false, strict_safety)?;

    Ok(ForwardOpenRequest {
        priority_tick,
        timeout_ticks,
        o2t_connection_id,
        t2o_connection_id,
        triad,
        timeout_multiplier_code,
        o2t_rpi,
        o2t_params,
        t2o_rpi,
        t2o_params,
        transport_class_trigger,
        connection_path,
        large,
    })
}

fn read_params(cursor: &mut ByteCursor<'_>, large: bool) -> Result<ConnectionParams, DecodeError> {
    if large {
        Ok(ConnectionParams::from_dword(cursor.read_u32_le()?))
    } else {
        Ok(ConnectionParams::from_word(cursor.read_u16_le()?))
    }
}

/// Decode a Forward Open success response body
pub fn decode_forward_open_response(
    cursor: &mut ByteCursor<'_>,
) -> Result<ForwardOpenResponse, DecodeError> {
    let o2t_connection_id = cursor.read_u32_le()?;
    let t2o_connection_id = cursor.read_u32_le()?;
    let triad = decode_triad(cursor)?;
    let o2t_api = cursor.read_u32_le()?;
    let t2o_api = cursor.read_u32_le()?;

    let reply_words = usize::from(cursor.read_u8()?);
    cursor.skip(1)?; // reserved
    let application_reply = cursor.take(reply_words * 2)?.to_vec();

    Ok(ForwardOpenResponse {
        o2t_connection_id,
        t2o_connection_id,
        triad,
        o2t_api,
        t2o_api,
        application_reply,
    })
}

/// Decode an unsuccessful Forward Open response body
pub fn decode_forward_open_error(
    cursor: &mut ByteCursor<'_>,
) -> Result<ForwardOpenErrorResponse, DecodeError> {
    let triad = decode_triad(cursor)?;
    let remaining_path_size = cursor.read_u8()?;
    cursor.skip(1)?; // reserved
    Ok(ForwardOpenErrorResponse { triad, remaining_path_size })
}

/// Decode a Forward Close request body
pub fn decode_forward_close_request(
    cursor: &mut ByteCursor<'_>,
    strict_safety: bool,
) -> Result<ForwardCloseRequest, DecodeError> {
    let priority_tick = cursor.read_u8()?;
    let timeout_ticks = cursor.read_u8()?;
    let triad = decode_triad(cursor)?;

    let path_words = usize::from(cursor.read_u8()?);
    cursor.skip(1)?; // reserved
    let connection_path = decode_path(cursor, path_words * 2, false, strict_safety)?;

    Ok(ForwardCloseRequest { priority_tick, timeout_ticks, triad, connection_path })
}

/// Decode a Forward Close success response body
pub fn decode_forward_close_response(
    cursor: &mut ByteCursor<'_>,
) -> Result<ForwardCloseResponse, DecodeError> {
    let triad = decode_triad(cursor)?;
    let reply_words = usize::from(cursor.read_u8()?);
    cursor.skip(1)?; // reserved
    let application_reply = cursor.take(reply_words * 2)?.to_vec();

    Ok(ForwardCloseResponse { triad, application_reply })
}
