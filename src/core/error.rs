//! Decoder error types

use thiserror::Error;

/// Errors raised while reading fields out of a frame.
///
/// These never abort a whole decode: the walker turns them into
/// diagnostics and decides how to continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A field or length runs past the readable end of the frame
    #[error("Truncated input at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        /// Absolute offset the read started at
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes that were left before the boundary
        available: usize,
    },

    /// Bit field request that can never be satisfied
    #[error("Invalid bit field: width {width} at bit offset {offset}")]
    InvalidBitField {
        /// Requested width in bits
        width: u32,
        /// Requested offset in bits
        offset: u32,
    },

    /// Cursor bounds outside the underlying buffer
    #[error("Invalid bounds {start}..{end} for buffer of {len} bytes")]
    InvalidBounds {
        /// Requested start
        start: usize,
        /// Requested end
        end: usize,
        /// Buffer length
        len: usize,
    },
}

impl DecodeError {
    /// Is this a truncation (as opposed to a caller mistake)?
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }
}
