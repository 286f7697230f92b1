//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Hex frame input and result rendering

pub mod exit_codes;
pub mod pipe;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitStatus};
pub use pipe::{format_result, frame_lines, parse_hex_frame, OutputFormat};
