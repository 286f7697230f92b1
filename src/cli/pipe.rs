//! CLI Pipe Support
//!
//! Reads hex-encoded frames from arguments or stdin and renders decode
//! results for stdout.

use crate::core::diagnostic::Severity;
use crate::core::session::DecodeResult;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};

/// Output format for decode results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented field tree and diagnostics
    #[default]
    Text,
    /// One JSON document per frame
    Json,
}

/// Parse one hex-encoded frame.
///
/// Whitespace, `:` and `-` separators and a leading `0x` are ignored.
pub fn parse_hex_frame(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    hex::decode(digits)
}

/// Frame lines from a reader: blank lines and `#` comments are skipped
pub fn frame_lines<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<String>> {
    reader.lines().filter(|line| match line {
        Ok(l) => {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        }
        Err(_) => true,
    })
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    frame: usize,
    length: usize,
    #[serde(flatten)]
    result: &'a DecodeResult,
}

/// Render one frame's result
pub fn format_result(
    index: usize,
    length: usize,
    result: &DecodeResult,
    format: OutputFormat,
    show_info: bool,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(text_format(index, length, result, show_info)),
        OutputFormat::Json => serde_json::to_string_pretty(&JsonFrame {
            frame: index,
            length,
            result,
        }),
    }
}

fn text_format(index: usize, length: usize, result: &DecodeResult, show_info: bool) -> String {
    let summary = &result.summary;
    let mut lines = vec![format!(
        "frame {index}: {length} bytes, {} elements, {} bytes walked{}",
        summary.elements,
        summary.consumed,
        if summary.ended_early { ", stopped early" } else { "" }
    )];

    if !result.tree.is_empty() {
        lines.push(result.tree.to_text());
    }
    lines.extend(
        result
            .diagnostics
            .iter()
            .filter(|d| show_info || d.severity == Severity::Warning)
            .map(ToString::to_string),
    );
    for sdu in &result.delivered {
        lines.push(format!(
            "delivered {} bytes ({}) to {}: {}",
            sdu.data.len(),
            if sdu.reassembled { "reassembled" } else { "complete" },
            sdu.handler,
            sdu.key
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{DecodeSession, FrameInput};

    #[test]
    fn test_parse_hex_frame_separators() {
        assert_eq!(parse_hex_frame("0x43 04:de-ad").unwrap(), vec![0x43, 0x04, 0xDE, 0xAD]);
        assert_eq!(parse_hex_frame("  c0\n").unwrap(), vec![0xC0]);
        assert!(parse_hex_frame("abc").is_err());
        assert!(parse_hex_frame("zz").is_err());
    }

    #[test]
    fn test_frame_lines_skip_comments() {
        let input = "# capture\n\nc0\n  \n4300\n";
        let lines: Vec<_> = frame_lines(input.as_bytes()).map(Result::unwrap).collect();
        assert_eq!(lines, vec!["c0", "4300"]);
    }

    #[test]
    fn test_text_output() {
        let mut session = DecodeSession::default();
        let frame = [0x47, 0x01, 0xAA];
        let result = session.decode_frame(&FrameInput::new(&frame));

        let text = format_result(1, frame.len(), &result, OutputFormat::Text, true).unwrap();
        assert!(text.starts_with("frame 1: 3 bytes, 1 elements, 3 bytes walked"));
        assert!(text.contains("Undecoded: aa [2..3]"));
        assert!(text.contains("info: unknown element type"));

        let quiet = format_result(1, frame.len(), &result, OutputFormat::Text, false).unwrap();
        assert!(!quiet.contains("info:"));
    }

    #[test]
    fn test_json_output() {
        let mut session = DecodeSession::default();
        let result = session.decode_frame(&FrameInput::new(&[0x07, 0x01]));

        let json = format_result(2, 2, &result, OutputFormat::Json, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frame"], 2);
        assert_eq!(value["diagnostics"][0]["kind"], "length_missing");
        assert_eq!(value["summary"]["ended_early"], true);
    }
}
