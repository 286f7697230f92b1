//! Segment reassembly store
//!
//! Keeps one accumulator per [`FragmentKey`] across frames. Segments for a
//! key are expected in order; nothing is reordered. A first segment for a
//! key that is still open replaces the old accumulator, a middle segment
//! with nothing open starts a synthetic accumulator so a best-effort result
//! is still possible. Idle flows are only dropped when the host asks for it
//! through [`FragmentStore::evict_idle`] or the configured cap is exceeded.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Identity of one reassembly flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentKey {
    /// Transmitter long RD ID
    pub transmitter: u32,
    /// Receiver long RD ID
    pub receiver: u32,
    /// Element type code the segments arrive in
    pub element_type: u8,
    /// DLC sequence number of the unit
    pub sequence: u16,
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}->{:08x} type {} sn {}",
            self.transmitter, self.receiver, self.element_type, self.sequence
        )
    }
}

/// Segmentation indicator carried by a DLC PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SegmentationIndicator {
    /// Complete unit, no reassembly
    Complete = 0,
    /// First segment
    First = 1,
    /// Last segment (carries an offset)
    Last = 2,
    /// Middle segment (carries an offset)
    Middle = 3,
}

impl SegmentationIndicator {
    /// Decode the 2-bit field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Complete,
            1 => Self::First,
            2 => Self::Last,
            _ => Self::Middle,
        }
    }

    /// Name for the field tree
    pub fn name(&self) -> &'static str {
        match self {
            Self::Complete => "Complete SDU",
            Self::First => "First segment",
            Self::Last => "Last segment",
            Self::Middle => "Middle segment",
        }
    }

    /// Whether a segmentation offset follows
    pub fn carries_offset(&self) -> bool {
        matches!(self, Self::Last | Self::Middle)
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Self::First)
    }

    pub fn is_last(&self) -> bool {
        matches!(self, Self::Last)
    }
}

/// One segment handed to the store
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    /// Where the segment sits in its unit
    pub indicator: SegmentationIndicator,
    /// Carried reassembly offset, for last and middle segments
    pub offset: Option<u16>,
    pub payload: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Unsegmented unit
    pub fn complete(payload: &'a [u8]) -> Self {
        Self {
            indicator: SegmentationIndicator::Complete,
            offset: None,
            payload,
        }
    }

    /// First segment of a unit
    pub fn first(payload: &'a [u8]) -> Self {
        Self {
            indicator: SegmentationIndicator::First,
            offset: None,
            payload,
        }
    }

    /// Middle segment at `offset`
    pub fn middle(offset: u16, payload: &'a [u8]) -> Self {
        Self {
            indicator: SegmentationIndicator::Middle,
            offset: Some(offset),
            payload,
        }
    }

    /// Last segment at `offset`
    pub fn last(offset: u16, payload: &'a [u8]) -> Self {
        Self {
            indicator: SegmentationIndicator::Last,
            offset: Some(offset),
            payload,
        }
    }

    pub fn is_first(&self) -> bool {
        self.indicator.is_first()
    }

    pub fn is_last(&self) -> bool {
        self.indicator.is_last()
    }
}

/// Bytes collected so far for one key
#[derive(Debug)]
pub struct FragmentAccumulator {
    data: BytesMut,
    complete: bool,
    segments: usize,
    synthetic: bool,
    last_touched: Instant,
}

impl FragmentAccumulator {
    fn seeded(payload: &[u8], synthetic: bool, now: Instant) -> Self {
        Self {
            data: BytesMut::from(payload),
            complete: false,
            segments: 1,
            synthetic,
            last_touched: now,
        }
    }

    fn append(&mut self, payload: &[u8], now: Instant) {
        self.data.extend_from_slice(payload);
        self.segments += 1;
        self.last_touched = now;
    }

    /// Bytes collected
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set once the last segment arrived
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of segments appended
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Started from an orphan segment rather than a first segment
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// Result of adding a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Unit still open
    Incomplete,
    /// Unit finished; the accumulator is gone
    Completed(Bytes),
    /// Middle segment with nothing open; kept in a synthetic accumulator
    Orphan,
}

/// Irregularities noticed while adding a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyWarning {
    /// Middle or last segment arrived with no open unit
    OrphanSegment,
    /// A first segment discarded an unfinished unit
    Overwrite { discarded: usize },
    /// Carried offset does not match the bytes collected so far
    OffsetMismatch { expected: usize, actual: usize },
    /// Another unit was dropped to stay under the accumulator cap
    Evicted { key: FragmentKey, discarded: usize },
}

/// Outcome plus any warnings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub outcome: SegmentOutcome,
    pub warnings: Vec<ReassemblyWarning>,
}

impl SegmentReport {
    fn new(outcome: SegmentOutcome) -> Self {
        Self {
            outcome,
            warnings: Vec::new(),
        }
    }

    /// Completed bytes, if any
    pub fn completed(&self) -> Option<&Bytes> {
        match &self.outcome {
            SegmentOutcome::Completed(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Store limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentStoreConfig {
    /// Maximum live accumulators (0 = unlimited)
    pub max_accumulators: usize,
}

/// Table of in-progress units, shared by every frame of a session
#[derive(Debug, Default)]
pub struct FragmentStore {
    config: FragmentStoreConfig,
    table: HashMap<FragmentKey, FragmentAccumulator>,
}

impl FragmentStore {
    /// Unlimited store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with limits
    pub fn with_config(config: FragmentStoreConfig) -> Self {
        Self {
            config,
            table: HashMap::new(),
        }
    }

    /// Feed one segment for `key`
    pub fn add_segment(&mut self, key: FragmentKey, segment: Segment<'_>) -> SegmentReport {
        self.add_segment_at(key, segment, Instant::now())
    }

    /// Same as [`add_segment`](Self::add_segment) with an explicit clock
    pub fn add_segment_at(&mut self, key: FragmentKey, segment: Segment<'_>, now: Instant) -> SegmentReport {
        match segment.indicator {
            SegmentationIndicator::Complete => {
                SegmentReport::new(SegmentOutcome::Completed(Bytes::copy_from_slice(segment.payload)))
            }
            SegmentationIndicator::First => {
                let mut report = SegmentReport::new(SegmentOutcome::Incomplete);
                let fresh = FragmentAccumulator::seeded(segment.payload, false, now);
                if let Some(previous) = self.table.insert(key, fresh) {
                    tracing::debug!(%key, discarded = previous.len(), "first segment replaced open unit");
                    report.warnings.push(ReassemblyWarning::Overwrite {
                        discarded: previous.len(),
                    });
                } else {
                    self.enforce_cap(key, &mut report);
                }
                report
            }
            SegmentationIndicator::Middle => match self.table.get_mut(&key) {
                Some(acc) => {
                    let mut report = SegmentReport::new(SegmentOutcome::Incomplete);
                    check_offset(acc, segment.offset, &mut report);
                    acc.append(segment.payload, now);
                    report
                }
                None => {
                    tracing::debug!(%key, "middle segment without first segment");
                    self.table
                        .insert(key, FragmentAccumulator::seeded(segment.payload, true, now));
                    let mut report = SegmentReport::new(SegmentOutcome::Orphan);
                    report.warnings.push(ReassemblyWarning::OrphanSegment);
                    self.enforce_cap(key, &mut report);
                    report
                }
            },
            SegmentationIndicator::Last => match self.table.remove(&key) {
                Some(mut acc) => {
                    let mut report = SegmentReport::new(SegmentOutcome::Incomplete);
                    check_offset(&acc, segment.offset, &mut report);
                    acc.append(segment.payload, now);
                    acc.complete = true;
                    tracing::trace!(%key, segments = acc.segments, bytes = acc.len(), "unit reassembled");
                    report.outcome = SegmentOutcome::Completed(acc.data.freeze());
                    report
                }
                None => {
                    tracing::debug!(%key, "last segment without first segment");
                    let mut report = SegmentReport::new(SegmentOutcome::Completed(
                        Bytes::copy_from_slice(segment.payload),
                    ));
                    report.warnings.push(ReassemblyWarning::OrphanSegment);
                    report
                }
            },
        }
    }

    /// Drop least recently touched units other than `keep` until the table
    /// fits the cap. Each drop is reported on `report`.
    fn enforce_cap(&mut self, keep: FragmentKey, report: &mut SegmentReport) {
        let max = self.config.max_accumulators;
        if max == 0 {
            return;
        }
        while self.table.len() > max {
            let oldest = self
                .table
                .iter()
                .filter(|(k, _)| **k != keep)
                .min_by_key(|(_, acc)| acc.last_touched)
                .map(|(k, _)| *k);
            match oldest {
                Some(key) => {
                    let discarded = self.table.remove(&key).map_or(0, |acc| acc.len());
                    tracing::debug!(%key, discarded, "accumulator evicted for capacity");
                    report.warnings.push(ReassemblyWarning::Evicted { key, discarded });
                }
                None => break,
            }
        }
    }

    /// Drop accumulators untouched for longer than `max_idle`
    pub fn evict_idle(&mut self, now: Instant, max_idle: Duration) -> Vec<FragmentKey> {
        let stale: Vec<FragmentKey> = self
            .table
            .iter()
            .filter(|(_, acc)| now.saturating_duration_since(acc.last_touched) > max_idle)
            .map(|(k, _)| *k)
            .collect();
        for key in &stale {
            self.table.remove(key);
        }
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "idle accumulators evicted");
        }
        stale
    }

    /// Open accumulator for a key
    pub fn get(&self, key: &FragmentKey) -> Option<&FragmentAccumulator> {
        self.table.get(key)
    }

    pub fn contains(&self, key: &FragmentKey) -> bool {
        self.table.contains_key(key)
    }

    /// Number of open units
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Forget every open unit
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

fn check_offset(acc: &FragmentAccumulator, offset: Option<u16>, report: &mut SegmentReport) {
    if let Some(actual) = offset {
        let expected = acc.len();
        if usize::from(actual) != expected {
            report.warnings.push(ReassemblyWarning::OffsetMismatch {
                expected,
                actual: usize::from(actual),
            });
        }
    }
}
