//! Multiple-message dispatch
//!
//! The Multiple Service Packet carries a count and a table of 16-bit byte
//! offsets into its service-data region; each sub-range holds one embedded
//! CIP message. Offsets must be strictly increasing and in bounds; a bad
//! offset fails only its own sub-message, never the siblings. The recursive
//! decode itself is supplied by the caller so that the recursion-depth
//! budget stays explicit.

use log::warn;

use crate::buffer::ByteCursor;
use crate::error::DecodeError;

/// Upper bound on embedded-message nesting used when no configuration is
/// supplied
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 16;

/// Validate a Multiple Service Packet offset table against its region
///
/// Returns one entry per offset: the `(start, end)` byte range of that
/// sub-message, or the error that invalidates it. Ranges end at the next
/// offset; the last range ends at `region_len`.
pub fn validate_offsets(
    offsets: &[u16],
    region_len: usize,
) -> Vec<Result<(usize, usize), DecodeError>> {
    let mut ranges = Vec::with_capacity(offsets.len());

    for (idx, &offset) in offsets.iter().enumerate() {
        let start = usize::from(offset);
        let end = match offsets.get(idx + 1) {
            Some(&next) => usize::from(next),
            None => region_len,
        };

        if start >= end {
            warn!(
                "Service offset {} out of order: start {} not before end {}",
                idx, start, end
            );
            ranges.push(Err(DecodeError::InconsistentLength {
                offset: start,
                declared: 0,
                available: end.saturating_sub(start),
            }));
            continue;
        }
        if end > region_len {
            ranges.push(Err(DecodeError::InconsistentLength {
                offset: start,
                declared: end - start,
                available: region_len.saturating_sub(start),
            }));
            continue;
        }
        ranges.push(Ok((start, end)));
    }

    ranges
}

/// Decode each sub-message of a service region through `decode_one`
///
/// `decode_one(index, bytes)` is the recursive entry back into the full
/// message decoder. Sub-messages that fail validation or decoding produce
/// an `Err` at their index while the rest keep decoding.
pub fn dispatch<T>(
    region: &[u8],
    offsets: &[u16],
    mut decode_one: impl FnMut(u16, &[u8]) -> Result<T, DecodeError>,
) -> Vec<Result<T, DecodeError>> {
    validate_offsets(offsets, region.len())
        .into_iter()
        .enumerate()
        .map(|(idx, range)| {
            let (start, end) = range?;
            decode_one(idx as u16, &region[start..end])
        })
        .collect()
}

/// Read the count and offset table of a Multiple Service Packet region
///
/// The cursor is positioned at the service count; offsets are relative to
/// the start of the count field.
pub fn read_offset_table(cursor: &mut ByteCursor<'_>) -> Result<Vec<u16>, DecodeError> {
    let count = usize::from(cursor.read_u16_le()?);
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(cursor.read_u16_le()?);
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_services_cover_region() {
        // Offsets [4, 10], region 14: ranges [4,10) and [10,14)
        let region: Vec<u8> = (0..14).collect();
        let results = dispatch(&region, &[4, 10], |_, bytes| Ok(bytes.to_vec()));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().as_slice(), &region[4..10]);
        assert_eq!(results[1].as_ref().unwrap().as_slice(), &region[10..14]);
    }

    #[test]
    fn test_non_increasing_offsets_fail_only_their_index() {
        let region = [0u8; 20];
        let results = dispatch(&region, &[4, 4, 10], |idx, _| Ok(idx));

        assert!(matches!(results[0], Err(DecodeError::InconsistentLength { .. })));
        assert_eq!(results[1], Ok(1));
        assert_eq!(results[2], Ok(2));
    }

    #[test]
    fn test_offset_beyond_region_fails_only_that_service() {
        let region = [0u8; 8];
        let results = dispatch(&region, &[2, 12], |idx, _| Ok(idx));

        // First range ends at the bad second offset
        assert!(matches!(results[0], Err(DecodeError::InconsistentLength { .. })));
        assert!(matches!(results[1], Err(DecodeError::InconsistentLength { .. })));
    }

    #[test]
    fn test_empty_sub_range_rejected() {
        let region = [0u8; 6];
        let results = dispatch(&region, &[6], |idx, _| Ok(idx));
        assert!(matches!(results[0], Err(DecodeError::InconsistentLength { .. })));
    }

    #[test]
    fn test_decode_error_is_isolated() {
        let region = [0u8; 12];
        let results = dispatch(&region, &[2, 6], |idx, _| {
            if idx == 0 {
                Err(DecodeError::Truncated { offset: 2, needed: 1 })
            } else {
                Ok(idx)
            }
        });

        assert_eq!(results[0], Err(DecodeError::Truncated { offset: 2, needed: 1 }));
        assert_eq!(results[1], Ok(1));
    }

    #[test]
    fn test_read_offset_table() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&6u16.to_le_bytes());
        data.extend_from_slice(&12u16.to_le_bytes());

        let mut cursor = ByteCursor::new(&data);
        assert_eq!(read_offset_table(&mut cursor).unwrap(), vec![6, 12]);
    }
}
