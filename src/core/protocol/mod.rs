//! MAC PDU protocol decoding
//!
//! Provides the pieces that turn a MAC PDU into a field tree:
//! - MAC header type and common header (`mac_header`)
//! - Multiplexing header codec (`mux`)
//! - Element registry and decoder context (`registry`)
//! - Element chain walker (`walker`)
//! - Subslot width resolution (`resolver`)
//! - Built-in element decoders (`elements`)

pub mod elements;
pub mod mac_header;
pub mod mux;
pub mod registry;
pub mod resolver;
pub mod walker;

pub use mac_header::{CommonHeader, MacHeader, SecurityMode, BROADCAST_ID};
pub use mux::{CodeSpace, ElementHeader, EncodingClass};
pub use registry::{DecodeOptions, ElementContext, ElementDecoder, ElementEntry, ElementRegistry};
pub use resolver::{resolve, Resolution, SubslotHint, SubslotWidth};
pub use walker::{ElementWalker, FrameOutput, ParseContext, WalkSummary, WalkerState};
