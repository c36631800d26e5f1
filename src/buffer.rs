//! Bounds-checked little-endian reader over a message buffer
//!
//! CIP is little-endian on the wire. The host's packet-buffer abstraction is
//! consumed as a slice; every read is bounds-checked and returns a
//! `DecodeError::Truncated` carrying the offset at which the buffer ran out,
//! so malformed captures never panic the decoder.

use bytes::Buf;

use crate::error::DecodeError;

/// Cursor over a byte slice with absolute offset tracking
///
/// `base` is the absolute offset of `data[0]` within the enclosing message,
/// so errors reported from a sub-range still point at the right byte of the
/// original buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor over `data` starting at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Create a cursor whose reported offsets start at `base`
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte to be read
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True when every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn check(&self, needed: usize) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                offset: self.position(),
                needed: needed - self.remaining(),
            });
        }
        Ok(())
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.check(1)?;
        let mut buf = &self.data[self.pos..];
        self.pos += 1;
        Ok(buf.get_u8())
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.check(1)?;
        Ok(self.data[self.pos])
    }

    /// Read a little-endian 16-bit value
    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        self.check(2)?;
        let mut buf = &self.data[self.pos..];
        self.pos += 2;
        Ok(buf.get_u16_le())
    }

    /// Read a little-endian 32-bit value
    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        self.check(4)?;
        let mut buf = &self.data[self.pos..];
        self.pos += 4;
        Ok(buf.get_u32_le())
    }

    /// Read a little-endian 64-bit value
    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        self.check(8)?;
        let mut buf = &self.data[self.pos..];
        self.pos += 8;
        Ok(buf.get_u64_le())
    }

    /// Consume `n` bytes and return them as a slice
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.check(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    /// Consume all remaining bytes
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    /// Split off a sub-cursor over the next `n` bytes
    ///
    /// The sub-cursor keeps absolute offset reporting. Fails with
    /// `InconsistentLength` when `n` overruns the remaining data, since a
    /// declared sub-length larger than its enclosing region is a structural
    /// error, not a short read.
    pub fn sub_cursor(&mut self, n: usize) -> Result<ByteCursor<'a>, DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::InconsistentLength {
                offset: self.position(),
                declared: n,
                available: self.remaining(),
            });
        }
        let base = self.position();
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(ByteCursor::with_base(slice, base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0302);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x07060504);
        assert_eq!(cursor.remaining(), 1);

        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u64_le().unwrap(), 0x0807060504030201);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_truncation_reports_offset() {
        let data = [0xAA, 0xBB];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_u8().unwrap();

        let err = cursor.read_u32_le().unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 1, needed: 3 });
    }

    #[test]
    fn test_sub_cursor_keeps_absolute_offsets() {
        let data = [0x00, 0x11, 0x22, 0x33, 0x44];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(2).unwrap();

        let mut sub = cursor.sub_cursor(2).unwrap();
        assert_eq!(sub.position(), 2);
        assert_eq!(sub.read_u8().unwrap(), 0x22);

        let err = sub.read_u16_le().unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 3, needed: 1 });

        // Parent continues after the sub-range
        assert_eq!(cursor.read_u8().unwrap(), 0x44);
    }

    #[test]
    fn test_sub_cursor_overrun_is_inconsistent_length() {
        let data = [0x00, 0x11];
        let mut cursor = ByteCursor::new(&data);

        let err = cursor.sub_cursor(5).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InconsistentLength { offset: 0, declared: 5, available: 2 }
        );
    }

    #[test]
    fn test_peek_and_take() {
        let data = [0x10, 0x20, 0x30];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.peek_u8().unwrap(), 0x10);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.take(2).unwrap(), &[0x10, 0x20]);
        assert_eq!(cursor.take_remaining(), &[0x30]);
        assert!(cursor.take(1).is_err());
    }
}
