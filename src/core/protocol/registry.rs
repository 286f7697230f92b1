//! Element dispatch table
//!
//! Two independent tables: one for the 6-bit code space shared by the
//! implicit/8-bit/16-bit encodings, one for 5-bit short IEs. The registry is
//! built once and handed to the walker by reference.

use super::mux::{CodeSpace, ElementHeader};
use super::resolver::SubslotHint;
use super::walker::{FrameOutput, ParseContext};
use crate::core::cursor::ByteCursor;
use crate::core::demux::HigherLayerDemux;
use crate::core::diagnostic::DiagnosticKind;
use crate::core::error::DecodeError;
use crate::core::field::FieldValue;
use crate::core::reassembly::FragmentStore;
use std::collections::HashMap;

/// Runtime knobs that element decoders consult
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// How to size subslot fields
    pub subslot_width: SubslotHint,
    /// Higher-layer decoder to force, by name
    pub payload_class: Option<String>,
}

/// Everything an element decoder may touch
pub struct ElementContext<'c, 'a> {
    /// Positioned at the first payload byte, bounded by the frame end
    pub cursor: &'c mut ByteCursor<'a>,
    pub header: ElementHeader,
    pub parse: &'c ParseContext,
    pub out: &'c mut FrameOutput,
    pub store: &'c mut FragmentStore,
    pub demux: &'c HigherLayerDemux,
    pub options: &'c DecodeOptions,
}

impl<'c, 'a> ElementContext<'c, 'a> {
    /// Absolute offset of the payload start
    pub fn payload_start(&self) -> usize {
        self.header.payload_offset()
    }

    /// End of the element: declared boundary, or the frame end when implicit
    pub fn payload_end(&self) -> usize {
        match self.header.declared_length {
            Some(len) => (self.payload_start() + len).min(self.cursor.end()),
            None => self.cursor.end(),
        }
    }

    /// Bytes left in this element
    pub fn remaining_in_element(&self) -> usize {
        self.payload_end().saturating_sub(self.cursor.position())
    }

    /// Peek a bit field in the bytes at the cursor and record it
    pub fn bits(&mut self, label: &str, bit_offset: u32, width: u32) -> Result<u64, DecodeError> {
        let value = self.cursor.read(width, bit_offset)?;
        let span = (bit_offset + width).div_ceil(8) as usize;
        self.out
            .tree
            .add_uint(label, value, self.cursor.position(), span);
        Ok(value)
    }

    /// Peek a single-bit flag and record it
    pub fn flag(&mut self, label: &str, bit_offset: u32) -> Result<bool, DecodeError> {
        let value = self.cursor.read(1, bit_offset)? == 1;
        self.out
            .tree
            .add_bool(label, value, self.cursor.position(), 1);
        Ok(value)
    }

    /// Peek a coded bit field and record it with its name
    pub fn named_bits(
        &mut self,
        label: &str,
        bit_offset: u32,
        width: u32,
        names: fn(u64) -> &'static str,
    ) -> Result<u64, DecodeError> {
        let value = self.cursor.read(width, bit_offset)?;
        let span = (bit_offset + width).div_ceil(8) as usize;
        self.out.tree.add(
            label,
            FieldValue::named(value, names(value)),
            self.cursor.position(),
            span,
        );
        Ok(value)
    }

    /// Peek reserved bits; non-zero values are reported, never fatal
    pub fn reserved(&mut self, bit_offset: u32, width: u32) -> Result<(), DecodeError> {
        let value = self.cursor.read(width, bit_offset)?;
        if value != 0 {
            let pos = self.cursor.position();
            let span = (bit_offset + width).div_ceil(8) as usize;
            self.out.diagnostics.report(
                DiagnosticKind::ReservedBitsNonZero,
                pos..pos + span,
                format!("{width} reserved bits at bit {bit_offset} hold {value:#x}"),
            );
        }
        Ok(())
    }

    /// Read and record one octet
    pub fn u8(&mut self, label: &str) -> Result<u8, DecodeError> {
        let offset = self.cursor.position();
        let value = self.cursor.read_u8()?;
        self.out.tree.add_uint(label, value, offset, 1);
        Ok(value)
    }

    /// Read and record a big-endian u16
    pub fn u16(&mut self, label: &str) -> Result<u16, DecodeError> {
        let offset = self.cursor.position();
        let value = self.cursor.read_u16()?;
        self.out.tree.add_uint(label, value, offset, 2);
        Ok(value)
    }

    /// Read and record a big-endian 24-bit value
    pub fn u24(&mut self, label: &str) -> Result<u32, DecodeError> {
        let offset = self.cursor.position();
        let value = self.cursor.read_u24()?;
        self.out.tree.add_uint(label, value, offset, 3);
        Ok(value)
    }

    /// Read and record a big-endian u32, shown in hex
    pub fn id32(&mut self, label: &str) -> Result<u32, DecodeError> {
        let offset = self.cursor.position();
        let value = self.cursor.read_u32()?;
        self.out
            .tree
            .add(label, FieldValue::Text(format!("0x{value:08x}")), offset, 4);
        Ok(value)
    }

    /// Read and record raw bytes
    pub fn bytes(&mut self, label: &str, length: usize) -> Result<&'a [u8], DecodeError> {
        let offset = self.cursor.position();
        let bytes = self.cursor.read_bytes(length)?;
        self.out.tree.add_bytes(label, bytes, offset);
        Ok(bytes)
    }

    /// Move past bytes whose fields were peeked
    pub fn advance(&mut self, length: usize) -> Result<(), DecodeError> {
        self.cursor.skip(length)
    }

    /// Open a subtree at the cursor
    pub fn open(&mut self, label: &str) -> usize {
        let offset = self.cursor.position();
        self.out.tree.open(label, offset)
    }

    /// Close a subtree at the cursor
    pub fn close(&mut self, node: usize) {
        let end = self.cursor.position();
        self.out.tree.close(node, end);
    }

    /// Take the rest of the element's payload
    pub fn payload(&mut self) -> Result<&'a [u8], DecodeError> {
        let length = self.remaining_in_element();
        self.cursor.read_bytes(length)
    }
}

/// Decoder for one element type's payload
pub trait ElementDecoder: Send + Sync {
    /// Decode from the cursor; consumption is measured by the walker
    fn decode(&self, ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError>;
}

impl<F> ElementDecoder for F
where
    F: Fn(&mut ElementContext<'_, '_>) -> Result<(), DecodeError> + Send + Sync,
{
    fn decode(&self, ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
        self(ctx)
    }
}

/// One table entry
pub struct ElementEntry {
    /// Element name for the field tree
    pub name: &'static str,
    /// `None` for types that are known but carry nothing worth decoding
    pub decoder: Option<Box<dyn ElementDecoder>>,
}

impl std::fmt::Debug for ElementEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementEntry")
            .field("name", &self.name)
            .field("has_decoder", &self.decoder.is_some())
            .finish()
    }
}

/// Code → decoder tables
#[derive(Debug, Default)]
pub struct ElementRegistry {
    long: HashMap<u8, ElementEntry>,
    short: [HashMap<u8, ElementEntry>; 2],
}

impl ElementRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in element decoder
    pub fn standard() -> Self {
        let mut registry = Self::new();
        super::elements::register_all(&mut registry);
        registry
    }

    fn table_mut(&mut self, space: CodeSpace) -> &mut HashMap<u8, ElementEntry> {
        match space {
            CodeSpace::Long => &mut self.long,
            CodeSpace::Short { payload_len } => &mut self.short[usize::from(payload_len.min(1))],
        }
    }

    fn table(&self, space: CodeSpace) -> &HashMap<u8, ElementEntry> {
        match space {
            CodeSpace::Long => &self.long,
            CodeSpace::Short { payload_len } => &self.short[usize::from(payload_len.min(1))],
        }
    }

    /// Register a decoder, replacing any previous entry for the code.
    ///
    /// Zero-length short IEs have no payload and the walker never dispatches
    /// them, so for `Short { payload_len: 0 }` only the name is kept and the
    /// decoder is dropped.
    pub fn register<D>(&mut self, space: CodeSpace, code: u8, name: &'static str, decoder: D)
    where
        D: ElementDecoder + 'static,
    {
        if space == (CodeSpace::Short { payload_len: 0 }) {
            tracing::warn!(code, name, "decoder for zero-length short IE ignored, keeping name only");
            self.register_name(space, code, name);
            return;
        }
        self.table_mut(space).insert(
            code,
            ElementEntry {
                name,
                decoder: Some(Box::new(decoder)),
            },
        );
    }

    /// Register a name only (the payload is shown as bytes)
    pub fn register_name(&mut self, space: CodeSpace, code: u8, name: &'static str) {
        self.table_mut(space).insert(code, ElementEntry { name, decoder: None });
    }

    /// Remove an entry
    pub fn unregister(&mut self, space: CodeSpace, code: u8) -> Option<ElementEntry> {
        self.table_mut(space).remove(&code)
    }

    /// Look up an entry
    pub fn lookup(&self, space: CodeSpace, code: u8) -> Option<&ElementEntry> {
        self.table(space).get(&code)
    }

    /// Display name for a code, registered or not
    pub fn name(&self, space: CodeSpace, code: u8) -> &'static str {
        self.lookup(space, code).map_or("Unknown", |e| e.name)
    }

    /// Number of entries in a table
    pub fn len(&self, space: CodeSpace) -> usize {
        self.table(space).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
        Ok(())
    }

    #[test]
    fn test_code_spaces_are_disjoint() {
        let mut registry = ElementRegistry::new();
        registry.register(CodeSpace::Long, 1, "Long one", noop);
        registry.register_name(CodeSpace::Short { payload_len: 0 }, 1, "Short one");

        assert_eq!(registry.name(CodeSpace::Long, 1), "Long one");
        assert_eq!(registry.name(CodeSpace::Short { payload_len: 0 }, 1), "Short one");
        assert_eq!(registry.name(CodeSpace::Short { payload_len: 1 }, 1), "Unknown");
        assert!(registry.lookup(CodeSpace::Short { payload_len: 0 }, 1).unwrap().decoder.is_none());
    }

    #[test]
    fn test_zero_length_short_keeps_name_only() {
        let mut registry = ElementRegistry::new();
        registry.register(CodeSpace::Short { payload_len: 0 }, 2, "Keep Alive IE", noop);
        registry.register(CodeSpace::Short { payload_len: 1 }, 2, "One byte", noop);

        let entry = registry.lookup(CodeSpace::Short { payload_len: 0 }, 2).unwrap();
        assert_eq!(entry.name, "Keep Alive IE");
        assert!(entry.decoder.is_none());
        assert!(registry.lookup(CodeSpace::Short { payload_len: 1 }, 2).unwrap().decoder.is_some());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ElementRegistry::new();
        registry.register(CodeSpace::Long, 5, "First", noop);
        registry.register(CodeSpace::Long, 5, "Second", noop);

        assert_eq!(registry.len(CodeSpace::Long), 1);
        assert_eq!(registry.name(CodeSpace::Long, 5), "Second");
        assert!(registry.unregister(CodeSpace::Long, 5).is_some());
        assert!(registry.lookup(CodeSpace::Long, 5).is_none());
    }

    #[test]
    fn test_standard_registry_contents() {
        let registry = ElementRegistry::standard();
        assert_eq!(registry.name(CodeSpace::Long, 0), "Padding");
        assert_eq!(registry.name(CodeSpace::Long, 18), "Resource Allocation IE");
        assert_eq!(registry.name(CodeSpace::Short { payload_len: 0 }, 2), "Keep Alive IE");
        assert!(registry.lookup(CodeSpace::Long, 7).is_none());
    }
}
