//! Bounds-checked byte cursor
//!
//! Every decoder reads through a [`ByteCursor`]. Reads never go past the
//! cursor's end (the frame boundary minus any reserved trailer); a read that
//! would fails with [`DecodeError::TruncatedInput`] instead of clamping.

use super::error::DecodeError;

/// Cursor over a frame buffer with an explicit readable end.
///
/// Positions are absolute offsets into the underlying buffer, so byte ranges
/// recorded in the field tree line up with the original capture.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ByteCursor<'a> {
    /// Cursor over the whole buffer
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Cursor over `data[start..end]`
    pub fn with_bounds(data: &'a [u8], start: usize, end: usize) -> Result<Self, DecodeError> {
        if start > end || end > data.len() {
            return Err(DecodeError::InvalidBounds {
                start,
                end,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            pos: start,
            end,
        })
    }

    /// Current absolute position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute end of the readable region
    pub fn end(&self) -> usize {
        self.end
    }

    /// Bytes left before the end
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Nothing left to read
    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    /// Underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if needed > self.remaining() {
            tracing::trace!(offset = self.pos, needed, available = self.remaining(), "read past cursor end");
            return Err(DecodeError::TruncatedInput {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read a big-endian bit field `bit_width` wide starting `bit_offset`
    /// bits after the current position. Does not advance.
    pub fn read(&self, bit_width: u32, bit_offset: u32) -> Result<u64, DecodeError> {
        if bit_width == 0 || bit_width > 64 {
            return Err(DecodeError::InvalidBitField {
                width: bit_width,
                offset: bit_offset,
            });
        }

        let total_bits = bit_offset as usize + bit_width as usize;
        let byte_count = total_bits.div_ceil(8);
        self.ensure(byte_count)?;

        let mut value: u128 = 0;
        for &byte in &self.data[self.pos..self.pos + byte_count] {
            value = (value << 8) | u128::from(byte);
        }

        let shift = byte_count * 8 - total_bits;
        let mask = (1u128 << bit_width) - 1;
        // mask keeps at most 64 bits
        Ok(((value >> shift) & mask) as u64)
    }

    /// Take `length` bytes and advance past them
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(length)?;
        let slice = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(slice)
    }

    /// Take everything up to the end
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..self.end];
        self.pos = self.end;
        slice
    }

    /// Look at the next byte without advancing
    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Ok(value)
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian 24-bit value
    pub fn read_u24(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Advance without looking at the bytes
    pub fn skip(&mut self, length: usize) -> Result<(), DecodeError> {
        self.ensure(length)?;
        self.pos += length;
        Ok(())
    }

    /// Move to an absolute position, which must not lie past the end
    pub fn seek(&mut self, position: usize) -> Result<(), DecodeError> {
        if position > self.end {
            return Err(DecodeError::TruncatedInput {
                offset: self.pos,
                needed: position.saturating_sub(self.pos),
                available: self.remaining(),
            });
        }
        self.pos = position;
        Ok(())
    }

    /// Sub-cursor over the next `length` bytes. The parent is not advanced.
    pub fn narrowed(&self, length: usize) -> Result<ByteCursor<'a>, DecodeError> {
        self.ensure(length)?;
        Ok(ByteCursor {
            data: self.data,
            pos: self.pos,
            end: self.pos + length,
        })
    }
}
