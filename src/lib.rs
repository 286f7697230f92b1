//! # nrdissect Core Library
//!
//! Decoder for DECT NR+ MAC PDUs and the multiplexed element chains they
//! carry:
//! - MAC header type and common header decoding
//! - Element chain walking with per-element length checks
//! - Subslot field width inference for allocation IEs
//! - DLC segment reassembly across frames
//! - Higher-layer payload hand-off
//! - CLI with exit codes and JSON output
//!
//! ## Example
//!
//! ```rust
//! use nrdissect_core::{DecodeSession, FrameInput};
//!
//! let mut session = DecodeSession::default();
//!
//! // Padding IE with an 8-bit length and two payload bytes
//! let result = session.decode_frame(&FrameInput::new(&[0x40, 0x02, 0x00, 0x00]));
//!
//! assert_eq!(result.summary.elements, 1);
//! assert!(result.diagnostics.is_empty());
//! println!("{}", result.tree.to_text());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitStatus, OutputFormat};
pub use crate::config::{ConfigError, DecoderConfig};
pub use crate::core::demux::{DeliveredSdu, HigherLayerDemux, SduDecoder};
pub use crate::core::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use crate::core::error::DecodeError;
pub use crate::core::field::{FieldNode, FieldTree, FieldValue};
pub use crate::core::protocol::{ElementContext, ElementRegistry, SubslotHint};
pub use crate::core::reassembly::{FragmentKey, FragmentStore};
pub use crate::core::session::{DecodeResult, DecodeSession, FrameInput, SharedSession};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
