//! MAC multiplexing header
//!
//! First octet: the top two bits (MAC_Ext) select how the element's length
//! is encoded.
//!
//! | MAC_Ext | Layout                                        |
//! |---------|-----------------------------------------------|
//! | `00`    | 6-bit type, no length (decoder sizes itself)  |
//! | `01`    | 6-bit type, 8-bit length                      |
//! | `10`    | 6-bit type, 16-bit big-endian length          |
//! | `11`    | 1-bit payload length (0/1), 5-bit short type  |

use crate::core::cursor::ByteCursor;
use crate::core::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Length encoding selected by MAC_Ext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncodingClass {
    /// No length field
    Implicit = 0,
    /// 8-bit length field
    Explicit8 = 1,
    /// 16-bit length field
    Explicit16 = 2,
    /// Short IE with 0 or 1 byte payload
    Short = 3,
}

impl EncodingClass {
    /// Decode the 2-bit selector
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Implicit,
            1 => Self::Explicit8,
            2 => Self::Explicit16,
            _ => Self::Short,
        }
    }

    /// Name for the field tree
    pub fn name(&self) -> &'static str {
        match self {
            Self::Implicit => "No length field",
            Self::Explicit8 => "8-bit length",
            Self::Explicit16 => "16-bit length",
            Self::Short => "Short IE",
        }
    }
}

/// Which type table a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeSpace {
    /// 6-bit codes shared by the three long encodings
    Long,
    /// 5-bit short IE codes; the payload length is part of the identity
    Short {
        /// 0 or 1
        payload_len: u8,
    },
}

/// Decoded multiplexing header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHeader {
    /// Absolute offset of the header's first octet
    pub offset: usize,
    pub class: EncodingClass,
    /// 6-bit (long) or 5-bit (short) type code
    pub type_code: u8,
    /// Declared payload length; `None` for implicit elements
    pub declared_length: Option<usize>,
    /// Header size in bytes
    pub header_len: usize,
}

impl ElementHeader {
    /// Read a header at the cursor and advance past it
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let offset = cursor.position();
        let first = cursor.peek_u8()?;
        let class = EncodingClass::from_bits(first >> 6);

        let (type_code, declared_length, header_len) = match class {
            EncodingClass::Implicit => (first & 0x3F, None, 1),
            EncodingClass::Explicit8 => {
                let length = cursor.read(8, 8)? as usize;
                (first & 0x3F, Some(length), 2)
            }
            EncodingClass::Explicit16 => {
                let length = cursor.read(16, 8)? as usize;
                (first & 0x3F, Some(length), 3)
            }
            EncodingClass::Short => {
                let length = usize::from((first >> 5) & 0x01);
                (first & 0x1F, Some(length), 1)
            }
        };
        cursor.skip(header_len)?;

        Ok(Self {
            offset,
            class,
            type_code,
            declared_length,
            header_len,
        })
    }

    /// Table the type code is looked up in
    pub fn code_space(&self) -> CodeSpace {
        match self.class {
            EncodingClass::Short => CodeSpace::Short {
                payload_len: self.declared_length.unwrap_or(0) as u8,
            },
            _ => CodeSpace::Long,
        }
    }

    /// Absolute offset of the first payload byte
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len
    }

    /// Encode a header (used by tests and tooling that builds frames)
    pub fn encode(class: EncodingClass, type_code: u8, length: usize) -> Vec<u8> {
        let selector = (class as u8) << 6;
        match class {
            EncodingClass::Implicit => vec![selector | (type_code & 0x3F)],
            EncodingClass::Explicit8 => vec![selector | (type_code & 0x3F), length as u8],
            EncodingClass::Explicit16 => {
                let len = (length as u16).to_be_bytes();
                vec![selector | (type_code & 0x3F), len[0], len[1]]
            }
            EncodingClass::Short => {
                let len_bit = u8::from(length > 0) << 5;
                vec![selector | len_bit | (type_code & 0x1F)]
            }
        }
    }
}
