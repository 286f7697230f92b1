//! Non-fatal decode findings
//!
//! Nothing in the decoder unwinds on malformed input. Every problem found is
//! recorded as a [`Diagnostic`] on the decode result and decoding carries on
//! according to the walker's continuation policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Kind of finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A field or length ran past the remaining bytes
    TruncatedInput,
    /// No decoder registered for an element type
    UnknownElementType,
    /// Decoder consumption disagrees with the declared length
    LengthMismatch,
    /// Implicit-length element with no decoder to size it
    LengthMissing,
    /// Reserved bits carry non-zero values
    ReservedBitsNonZero,
    /// Middle or last segment without a first segment
    ReassemblyOrphanSegment,
    /// First segment replaced an unfinished unit
    ReassemblyOverwrite,
    /// Carried segment offset disagrees with the bytes collected so far
    ReassemblySegmentOffset,
    /// An open unit was dropped to respect the accumulator cap
    ReassemblyEvicted,
}

impl DiagnosticKind {
    /// Default severity for the kind
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownElementType | Self::ReassemblySegmentOffset => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Short name
    pub fn name(&self) -> &'static str {
        match self {
            Self::TruncatedInput => "truncated input",
            Self::UnknownElementType => "unknown element type",
            Self::LengthMismatch => "length mismatch",
            Self::LengthMissing => "length missing",
            Self::ReservedBitsNonZero => "reserved bits non-zero",
            Self::ReassemblyOrphanSegment => "orphan segment",
            Self::ReassemblyOverwrite => "reassembly overwrite",
            Self::ReassemblySegmentOffset => "segment offset",
            Self::ReassemblyEvicted => "reassembly eviction",
        }
    }
}

/// How much attention a finding deserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Something is off with the frame
    Warning,
}

/// A single finding with the bytes it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Absolute offset
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with the kind's default severity
    pub fn new(kind: DiagnosticKind, range: Range<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            offset: range.start,
            length: range.end.saturating_sub(range.start),
            message: message.into(),
        }
    }

    /// Byte range covered
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{level}: {} [{}..{}]: {}",
            self.kind.name(),
            self.offset,
            self.offset + self.length,
            self.message
        )
    }
}

/// Ordered collection of diagnostics for one decode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!("{diagnostic}"),
            Severity::Info => tracing::debug!("{diagnostic}"),
        }
        self.0.push(diagnostic);
    }

    /// Record a finding from parts
    pub fn report(&mut self, kind: DiagnosticKind, range: Range<usize>, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, range, message));
    }

    /// Number of findings of a kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.0.iter().filter(|d| d.kind == kind).count()
    }

    /// Any warnings at all?
    pub fn has_warnings(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Warning)
    }

    /// All findings
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severity() {
        assert_eq!(DiagnosticKind::UnknownElementType.severity(), Severity::Info);
        assert_eq!(DiagnosticKind::LengthMismatch.severity(), Severity::Warning);
    }

    #[test]
    fn test_collection_counts() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticKind::UnknownElementType, 0..6, "type 3");
        assert!(!diags.has_warnings());

        diags.report(DiagnosticKind::LengthMissing, 6..10, "type 9");
        assert!(diags.has_warnings());
        assert_eq!(diags.count(DiagnosticKind::LengthMissing), 1);
        assert_eq!(diags.iter().next().unwrap().range(), 0..6);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::new(DiagnosticKind::LengthMismatch, 2..5, "declared 3, consumed 2");
        assert_eq!(d.to_string(), "warning: length mismatch [2..5]: declared 3, consumed 2");
    }
}
