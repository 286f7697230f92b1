//! Core module containing the decoding engine
//!
//! This module provides:
//! - Bounds-checked byte cursor
//! - Field tree and diagnostics for decode results
//! - Segment reassembly store
//! - MAC PDU protocol decoding (header, element chain, element decoders)
//! - Higher-layer demultiplexer
//! - Decode sessions

pub mod cursor;
pub mod demux;
pub mod diagnostic;
pub mod error;
pub mod field;
pub mod protocol;
pub mod reassembly;
pub mod session;

pub use cursor::ByteCursor;
pub use demux::{DeliveredSdu, HigherLayerDemux, Ipv6Summary, SduDecoder};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::DecodeError;
pub use field::{FieldNode, FieldTree, FieldValue};
pub use reassembly::{FragmentKey, FragmentStore, Segment, SegmentOutcome, SegmentationIndicator};
pub use session::{DecodeResult, DecodeSession, FrameInput, SharedSession};
