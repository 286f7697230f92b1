//! Element chain walker
//!
//! Reads one multiplexing header at a time, resolves the element's length,
//! hands the payload to the registered decoder and enforces the declared
//! length: whatever the decoder consumed, the next header is read at the
//! boundary the header declared.
//!
//! ```text
//! AwaitingHeader --header ok--> Dispatching --element done--> AwaitingHeader
//! AwaitingHeader --frame exhausted / bad header--> Done
//! Dispatching --truncation / length missing / nothing after header--> Done
//! ```

use super::mux::{CodeSpace, ElementHeader};
use super::registry::{DecodeOptions, ElementContext, ElementRegistry};
use crate::core::cursor::ByteCursor;
use crate::core::demux::{DeliveredSdu, HigherLayerDemux};
use crate::core::diagnostic::{DiagnosticKind, Diagnostics};
use crate::core::field::{FieldTree, FieldValue};
use crate::core::reassembly::FragmentStore;
use serde::{Deserialize, Serialize};

/// Per-frame state the walker mutates as it advances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseContext {
    /// Transmitter long RD ID
    pub transmitter: u32,
    /// Receiver long RD ID
    pub receiver: u32,
    /// Type code of the element being decoded
    pub element_type: Option<u8>,
    /// Declared length of the element being decoded
    pub declared_length: Option<usize>,
    /// Whether the current element has a declared length at all
    pub has_length: bool,
}

impl ParseContext {
    /// Fresh context for one frame
    pub fn new(transmitter: u32, receiver: u32) -> Self {
        Self {
            transmitter,
            receiver,
            ..Self::default()
        }
    }
}

/// Accumulated output of a frame decode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub tree: FieldTree,
    pub diagnostics: Diagnostics,
    /// Higher-layer units completed while decoding the frame
    pub delivered: Vec<DeliveredSdu>,
}

/// Walker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkerState {
    /// Next byte starts a multiplexing header
    AwaitingHeader,
    /// Header read, payload not yet handled
    Dispatching(ElementHeader),
    /// Chain finished
    Done,
}

/// Summary of one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkSummary {
    /// Elements whose header was read
    pub elements: usize,
    /// Bytes consumed from the chain start
    pub consumed: usize,
    /// The chain stopped on an error before the frame end
    pub ended_early: bool,
}

/// Walks a chain of multiplexed elements
pub struct ElementWalker<'r> {
    registry: &'r ElementRegistry,
    demux: &'r HigherLayerDemux,
    options: &'r DecodeOptions,
}

impl<'r> ElementWalker<'r> {
    pub fn new(registry: &'r ElementRegistry, demux: &'r HigherLayerDemux, options: &'r DecodeOptions) -> Self {
        Self {
            registry,
            demux,
            options,
        }
    }

    /// Walk from the cursor position to its end
    pub fn walk(
        &self,
        cursor: &mut ByteCursor<'_>,
        parse: &mut ParseContext,
        store: &mut FragmentStore,
        out: &mut FrameOutput,
    ) -> WalkSummary {
        let start = cursor.position();
        let mut elements = 0;
        let mut ended_early = false;
        let mut state = WalkerState::AwaitingHeader;

        loop {
            state = match state {
                WalkerState::AwaitingHeader => {
                    if cursor.is_empty() {
                        WalkerState::Done
                    } else {
                        let next = self.read_header(cursor, out);
                        ended_early |= next == WalkerState::Done;
                        next
                    }
                }
                WalkerState::Dispatching(header) => {
                    elements += 1;
                    let next = self.dispatch(header, cursor, parse, store, out);
                    if next == WalkerState::Done {
                        ended_early = true;
                    }
                    next
                }
                WalkerState::Done => break,
            };
        }

        let consumed = cursor.position() - start;
        tracing::debug!(elements, consumed, ended_early, "element chain walked");
        WalkSummary {
            elements,
            consumed,
            ended_early,
        }
    }

    fn read_header(&self, cursor: &mut ByteCursor<'_>, out: &mut FrameOutput) -> WalkerState {
        let offset = cursor.position();
        match ElementHeader::parse(cursor) {
            Ok(header) => WalkerState::Dispatching(header),
            Err(e) => {
                out.diagnostics.report(
                    DiagnosticKind::TruncatedInput,
                    offset..cursor.end(),
                    format!("multiplexing header: {e}"),
                );
                let rest = cursor.rest();
                out.tree.add_bytes("Truncated header", rest, offset);
                WalkerState::Done
            }
        }
    }

    fn dispatch(
        &self,
        header: ElementHeader,
        cursor: &mut ByteCursor<'_>,
        parse: &mut ParseContext,
        store: &mut FragmentStore,
        out: &mut FrameOutput,
    ) -> WalkerState {
        parse.element_type = Some(header.type_code);
        parse.declared_length = header.declared_length;
        parse.has_length = header.declared_length.is_some();

        let space = header.code_space();
        let entry = self.registry.lookup(space, header.type_code);
        let name = entry.map_or("Unknown", |e| e.name);
        tracing::debug!(
            offset = header.offset,
            code = header.type_code,
            ?space,
            length = ?header.declared_length,
            name,
            "dispatching element"
        );

        let depth = out.tree.depth();
        let node = out.tree.open(name, header.offset);
        self.record_header(&header, name, out);

        let next = self.dispatch_payload(header, name, cursor, parse, store, out);
        out.tree.unwind_to(depth + 1);
        out.tree.close(node, cursor.position());
        next
    }

    fn record_header(&self, header: &ElementHeader, name: &str, out: &mut FrameOutput) {
        let tree = &mut out.tree;
        tree.add(
            "MAC_Ext",
            FieldValue::named(header.class as u8, header.class.name()),
            header.offset,
            1,
        );
        match header.code_space() {
            CodeSpace::Short { payload_len } => {
                tree.add_uint("IE length", payload_len, header.offset, 1);
                tree.add("IE type", FieldValue::named(header.type_code, name), header.offset, 1);
            }
            CodeSpace::Long => {
                tree.add("IE type", FieldValue::named(header.type_code, name), header.offset, 1);
                if let Some(length) = header.declared_length {
                    tree.add_uint("IE length", length as u64, header.offset + 1, header.header_len - 1);
                }
            }
        }
    }

    fn dispatch_payload(
        &self,
        header: ElementHeader,
        name: &str,
        cursor: &mut ByteCursor<'_>,
        parse: &ParseContext,
        store: &mut FragmentStore,
        out: &mut FrameOutput,
    ) -> WalkerState {
        let payload_start = cursor.position();

        match header.declared_length {
            Some(0) => return WalkerState::AwaitingHeader,
            Some(len) if len > cursor.remaining() => {
                out.diagnostics.report(
                    DiagnosticKind::TruncatedInput,
                    header.offset..cursor.end(),
                    format!("{name}: declared {len} bytes, {} left in frame", cursor.remaining()),
                );
                let rest = cursor.rest();
                out.tree.add_bytes("Truncated payload", rest, payload_start);
                return WalkerState::Done;
            }
            _ => {}
        }

        if cursor.is_empty() {
            out.diagnostics.report(
                DiagnosticKind::TruncatedInput,
                header.offset..payload_start,
                format!("{name}: no payload after header"),
            );
            return WalkerState::Done;
        }

        let decoder = self
            .registry
            .lookup(header.code_space(), header.type_code)
            .and_then(|e| e.decoder.as_deref());

        let Some(decoder) = decoder else {
            return self.skip_undecoded(header, cursor, out);
        };

        let mut ctx = ElementContext {
            cursor: &mut *cursor,
            header,
            parse,
            out: &mut *out,
            store,
            demux: self.demux,
            options: self.options,
        };
        let result = decoder.decode(&mut ctx);
        let consumed = cursor.position() - payload_start;

        if let Err(e) = result {
            out.diagnostics.report(
                DiagnosticKind::TruncatedInput,
                payload_start..cursor.end(),
                format!("{name}: {e}"),
            );
            return WalkerState::Done;
        }

        let Some(declared) = header.declared_length else {
            return WalkerState::AwaitingHeader;
        };

        if consumed != declared {
            out.diagnostics.report(
                DiagnosticKind::LengthMismatch,
                payload_start..payload_start + declared,
                format!("{name}: declared {declared} bytes, decoder consumed {consumed}"),
            );
        }
        let boundary = payload_start + declared;
        if consumed < declared {
            let tail = &cursor.data()[cursor.position()..boundary];
            out.tree.add_bytes("Undecoded", tail, cursor.position());
        }
        // boundary was checked against the remaining length above
        match cursor.seek(boundary) {
            Ok(()) => WalkerState::AwaitingHeader,
            Err(_) => WalkerState::Done,
        }
    }

    fn skip_undecoded(&self, header: ElementHeader, cursor: &mut ByteCursor<'_>, out: &mut FrameOutput) -> WalkerState {
        let offset = cursor.position();
        let known = self.registry.lookup(header.code_space(), header.type_code).is_some();

        match header.declared_length {
            Some(len) => {
                // length was checked against the remaining bytes by the caller
                let bytes = match cursor.read_bytes(len) {
                    Ok(bytes) => bytes,
                    Err(_) => return WalkerState::Done,
                };
                out.tree.add_bytes("Undecoded", bytes, offset);
                if !known {
                    out.diagnostics.report(
                        DiagnosticKind::UnknownElementType,
                        header.offset..offset + len,
                        format!("no decoder for IE type {}", header.type_code),
                    );
                }
                WalkerState::AwaitingHeader
            }
            None => {
                let rest = cursor.rest();
                out.tree.add_bytes("Undecoded", rest, offset);
                out.diagnostics.report(
                    DiagnosticKind::LengthMissing,
                    header.offset..offset + rest.len(),
                    format!("IE type {} has no length field and no decoder", header.type_code),
                );
                WalkerState::Done
            }
        }
    }
}
