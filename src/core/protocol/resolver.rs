//! Subslot width resolution
//!
//! Resource allocation and random access resource IEs carry a start subslot
//! that is 8 bits wide for numerologies up to 4 and 9 bits above. The
//! numerology is not in the IE, so the width is inferred: each hypothesis
//! implies a total IE length from the IE's own presence flags, and the one
//! matching the declared length wins. Without a declared length the 8-bit
//! layout is assumed. This is a heuristic of the wire format, not a fix.

use serde::{Deserialize, Serialize};

/// Candidate subslot field widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubslotWidth {
    /// One octet
    Bits8,
    /// Seven reserved bits + nine subslot bits, two octets
    Bits9,
}

impl SubslotWidth {
    /// Octets the start subslot occupies
    pub fn octets(&self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits9 => 2,
        }
    }

    /// Width of the value itself
    pub fn bits(&self) -> u32 {
        match self {
            Self::Bits8 => 8,
            Self::Bits9 => 9,
        }
    }
}

/// Host knowledge about the numerology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubslotHint {
    /// Infer from the declared length
    #[default]
    Infer,
    /// Numerology known to be 4 or below
    Bits8,
    /// Numerology known to be above 4
    Bits9,
}

/// Outcome of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: SubslotWidth,
    /// Total length implied by the chosen width
    pub computed: usize,
    /// Chosen width reproduces the declared length
    pub matched: bool,
    /// Chosen by inference rather than by the host
    pub inferred: bool,
}

/// Pick the subslot width for an IE.
///
/// `layout` returns the total payload length the IE would have under a
/// width, given the flags already read. When both widths reproduce the
/// declared length, or neither does, the 8-bit layout is chosen.
pub fn resolve<F>(declared: Option<usize>, hint: SubslotHint, layout: F) -> Resolution
where
    F: Fn(SubslotWidth) -> usize,
{
    let pinned = match hint {
        SubslotHint::Infer => None,
        SubslotHint::Bits8 => Some(SubslotWidth::Bits8),
        SubslotHint::Bits9 => Some(SubslotWidth::Bits9),
    };

    if let Some(width) = pinned {
        let computed = layout(width);
        return Resolution {
            width,
            computed,
            matched: declared.map_or(true, |d| d == computed),
            inferred: false,
        };
    }

    let len8 = layout(SubslotWidth::Bits8);
    let Some(declared) = declared else {
        return Resolution {
            width: SubslotWidth::Bits8,
            computed: len8,
            matched: true,
            inferred: true,
        };
    };

    let len9 = layout(SubslotWidth::Bits9);
    let (width, computed) = if len8 != declared && len9 == declared {
        (SubslotWidth::Bits9, len9)
    } else {
        (SubslotWidth::Bits8, len8)
    };
    tracing::trace!(declared, len8, len9, ?width, "subslot width resolved");

    Resolution {
        width,
        computed,
        matched: computed == declared,
        inferred: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // two allocations: each start subslot plus one length octet, behind a
    // two octet fixed part
    fn two_allocations(width: SubslotWidth) -> usize {
        2 + 2 * (width.octets() + 1)
    }

    #[test]
    fn test_declared_length_selects_hypothesis() {
        let r = resolve(Some(6), SubslotHint::Infer, two_allocations);
        assert_eq!(r.width, SubslotWidth::Bits8);
        assert!(r.matched);

        let r = resolve(Some(8), SubslotHint::Infer, two_allocations);
        assert_eq!(r.width, SubslotWidth::Bits9);
        assert_eq!(r.computed, 8);
    }

    #[test]
    fn test_tie_prefers_eight_bits() {
        let r = resolve(Some(1), SubslotHint::Infer, |_| 1);
        assert_eq!(r.width, SubslotWidth::Bits8);
        assert!(r.matched);
    }

    #[test]
    fn test_no_match_falls_back_to_eight_bits() {
        let r = resolve(Some(11), SubslotHint::Infer, two_allocations);
        assert_eq!(r.width, SubslotWidth::Bits8);
        assert!(!r.matched);
    }

    #[test]
    fn test_missing_length_defaults_to_eight_bits() {
        let r = resolve(None, SubslotHint::Infer, two_allocations);
        assert_eq!(r.width, SubslotWidth::Bits8);
        assert!(r.inferred);
    }

    #[test]
    fn test_host_hint_wins() {
        let r = resolve(Some(6), SubslotHint::Bits9, two_allocations);
        assert_eq!(r.width, SubslotWidth::Bits9);
        assert!(!r.matched);
        assert!(!r.inferred);
    }
}
