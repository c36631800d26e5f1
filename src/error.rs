//! Decode error taxonomy
//!
//! Every decode failure is scoped to the smallest unit that can fail (one
//! segment, one embedded service, one message) so that sibling data keeps
//! decoding. Errors carry the absolute byte offset where they occurred.

use serde::Serialize;
use thiserror::Error;

/// Errors produced while decoding CIP messages and EPATH segments
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DecodeError {
    /// The buffer ended before a declared field was complete
    #[error("buffer truncated at offset {offset}: {needed} more byte(s) required")]
    Truncated {
        offset: usize,
        needed: usize,
    },

    /// A recognized tag selected a sub-format with no defined layout
    #[error("unsupported {what} 0x{value:02x} at offset {offset}")]
    UnsupportedFormat {
        what: &'static str,
        value: u8,
        offset: usize,
    },

    /// A declared sub-length would overrun the enclosing region
    #[error("inconsistent length at offset {offset}: {declared} byte(s) declared, {available} available")]
    InconsistentLength {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// Embedded messages nested deeper than the configured limit
    #[error("embedded message nesting exceeded the recursion limit")]
    RecursionLimitExceeded,
}

impl DecodeError {
    /// Byte offset the error was reported at, if it has one
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::UnsupportedFormat { offset, .. }
            | DecodeError::InconsistentLength { offset, .. } => Some(*offset),
            DecodeError::RecursionLimitExceeded => None,
        }
    }
}
