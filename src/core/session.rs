//! Decode sessions
//!
//! A session owns everything that outlives a single frame: the element
//! registry, the higher-layer demultiplexer, the configuration and the
//! fragment store. Frames are decoded one after another through
//! [`DecodeSession`]; [`SharedSession`] puts the store behind a lock so
//! independent frames can be decoded from several threads.

use super::cursor::ByteCursor;
use super::demux::{DeliveredSdu, HigherLayerDemux};
use super::diagnostic::{DiagnosticKind, Diagnostics};
use super::field::FieldTree;
use super::protocol::mac_header::{MacHeader, BROADCAST_ID};
use super::protocol::registry::{DecodeOptions, ElementRegistry};
use super::protocol::walker::{ElementWalker, FrameOutput, ParseContext, WalkSummary};
use super::reassembly::{FragmentKey, FragmentStore};
use crate::config::DecoderConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// One frame to decode
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub data: &'a [u8],
    /// Offset of the element chain in `data`
    pub start: usize,
    /// Declared frame length from `start`
    pub length: usize,
    /// Trailing integrity check bytes to leave alone
    pub trailer: Option<usize>,
    pub transmitter: u32,
    pub receiver: u32,
}

impl<'a> FrameInput<'a> {
    /// Whole buffer, no trailer, broadcast addressing
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            length: data.len(),
            trailer: None,
            transmitter: 0,
            receiver: BROADCAST_ID,
        }
    }

    pub fn with_ids(mut self, transmitter: u32, receiver: u32) -> Self {
        self.transmitter = transmitter;
        self.receiver = receiver;
        self
    }

    pub fn with_trailer(mut self, trailer: usize) -> Self {
        self.trailer = Some(trailer);
        self
    }

    pub fn with_range(mut self, start: usize, length: usize) -> Self {
        self.start = start;
        self.length = length;
        self
    }
}

/// Everything one frame decode produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeResult {
    /// MAC header, when the frame was decoded as a full MAC PDU
    pub mac_header: Option<MacHeader>,
    pub tree: FieldTree,
    pub diagnostics: Diagnostics,
    pub delivered: Vec<DeliveredSdu>,
    /// Element chain summary; the walker always ends in its done state
    pub summary: WalkSummary,
}

impl DecodeResult {
    fn new(mac_header: Option<MacHeader>, out: FrameOutput, summary: WalkSummary) -> Self {
        Self {
            mac_header,
            tree: out.tree,
            diagnostics: out.diagnostics,
            delivered: out.delivered,
            summary,
        }
    }
}

const NOTHING_WALKED: WalkSummary = WalkSummary {
    elements: 0,
    consumed: 0,
    ended_early: true,
};

/// Borrowed view of the session parts used for one frame
struct FrameDecoder<'s> {
    registry: &'s ElementRegistry,
    demux: &'s HigherLayerDemux,
    options: &'s DecodeOptions,
    config: &'s DecoderConfig,
}

impl FrameDecoder<'_> {
    fn frame(&self, input: &FrameInput<'_>, store: &mut FragmentStore) -> DecodeResult {
        let mut out = FrameOutput::default();
        let summary = self.walk(input, store, &mut out);
        DecodeResult::new(None, out, summary)
    }

    fn walk(&self, input: &FrameInput<'_>, store: &mut FragmentStore, out: &mut FrameOutput) -> WalkSummary {
        let data = input.data;
        let start = input.start.min(data.len());
        let mut end = input.start.saturating_add(input.length);
        if end > data.len() {
            out.diagnostics.report(
                DiagnosticKind::TruncatedInput,
                start..data.len(),
                format!("declared frame length {} exceeds the {} bytes captured", input.length, data.len() - start),
            );
            end = data.len();
        }

        let reserved = input.trailer.unwrap_or(0);
        let walk_end = match end.checked_sub(reserved) {
            Some(walk_end) if walk_end >= start => walk_end,
            _ => {
                out.diagnostics.report(
                    DiagnosticKind::TruncatedInput,
                    start..end,
                    format!("{reserved} trailer bytes do not fit in the frame"),
                );
                return NOTHING_WALKED;
            }
        };

        let mut cursor = match ByteCursor::with_bounds(data, start, walk_end) {
            Ok(cursor) => cursor,
            Err(e) => {
                out.diagnostics
                    .report(DiagnosticKind::TruncatedInput, start..end, e.to_string());
                return NOTHING_WALKED;
            }
        };

        let mut parse = ParseContext::new(input.transmitter, input.receiver);
        let walker = ElementWalker::new(self.registry, self.demux, self.options);
        let summary = walker.walk(&mut cursor, &mut parse, store, out);

        if reserved > 0 {
            out.tree.add_bytes("MIC", &data[walk_end..end], walk_end);
        }
        summary
    }

    fn mac_pdu(&self, pdu: &FrameInput<'_>, store: &mut FragmentStore) -> DecodeResult {
        let data = pdu.data;
        let mut out = FrameOutput::default();
        let mut cursor = ByteCursor::new(data);

        let header = match MacHeader::decode(&mut cursor, &mut out.tree, &mut out.diagnostics) {
            Ok(header) => header,
            Err(e) => {
                out.tree.unwind_to(0);
                out.diagnostics
                    .report(DiagnosticKind::TruncatedInput, 0..data.len(), format!("MAC header: {e}"));
                return DecodeResult::new(None, out, NOTHING_WALKED);
            }
        };

        if !header.is_known() {
            let offset = cursor.position();
            let rest = cursor.rest();
            out.tree.add_bytes("Undecoded", rest, offset);
            out.diagnostics.report(
                DiagnosticKind::UnknownElementType,
                offset..data.len(),
                "MAC header type has no known common header",
            );
            return DecodeResult::new(Some(header), out, NOTHING_WALKED);
        }

        let mut input = FrameInput::new(data)
            .with_range(header.length, data.len() - header.length)
            .with_ids(
                header.transmitter().unwrap_or(pdu.transmitter),
                header.receiver().unwrap_or(pdu.receiver),
            );
        if header.security.has_mic() {
            input = input.with_trailer(self.config.security.mic_length);
        }

        tracing::debug!(
            common = ?header.common,
            security = ?header.security,
            len = data.len(),
            "decoding MAC PDU"
        );
        let summary = self.walk(&input, store, &mut out);
        DecodeResult::new(Some(header), out, summary)
    }
}

/// Single-owner decode session
#[derive(Debug)]
pub struct DecodeSession {
    registry: ElementRegistry,
    demux: HigherLayerDemux,
    store: FragmentStore,
    options: DecodeOptions,
    config: DecoderConfig,
}

impl Default for DecodeSession {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl DecodeSession {
    /// Session with the built-in decoders
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_parts(ElementRegistry::standard(), HigherLayerDemux::standard(), config)
    }

    /// Session with a custom registry and demultiplexer
    pub fn with_parts(registry: ElementRegistry, demux: HigherLayerDemux, config: DecoderConfig) -> Self {
        Self {
            registry,
            demux,
            store: FragmentStore::with_config(config.store_config()),
            options: config.decode_options(),
            config,
        }
    }

    /// Decode an element chain described by `input`
    pub fn decode_frame(&mut self, input: &FrameInput<'_>) -> DecodeResult {
        let Self {
            registry,
            demux,
            store,
            options,
            config,
        } = self;
        FrameDecoder {
            registry,
            demux,
            options,
            config,
        }
        .frame(input, store)
    }

    /// Decode a complete MAC PDU: header, element chain and MIC
    pub fn decode_mac_pdu(&mut self, data: &[u8]) -> DecodeResult {
        self.decode_mac_pdu_with(&FrameInput::new(data))
    }

    /// Decode a complete MAC PDU held in `input.data`.
    ///
    /// The header decides where the element chain starts and whether a MIC
    /// trails it. The identifiers of `input` fill in whatever the common
    /// header does not carry, such as both ids of a Data header.
    pub fn decode_mac_pdu_with(&mut self, input: &FrameInput<'_>) -> DecodeResult {
        let Self {
            registry,
            demux,
            store,
            options,
            config,
        } = self;
        FrameDecoder {
            registry,
            demux,
            options,
            config,
        }
        .mac_pdu(input, store)
    }

    /// Drop accumulators idle past the configured limit
    pub fn evict_idle(&mut self, now: Instant) -> Vec<FragmentKey> {
        match self.config.reassembly.idle_timeout() {
            Some(max_idle) => self.store.evict_idle(now, max_idle),
            None => Vec::new(),
        }
    }

    pub fn registry_mut(&mut self) -> &mut ElementRegistry {
        &mut self.registry
    }

    pub fn demux_mut(&mut self) -> &mut HigherLayerDemux {
        &mut self.demux
    }

    pub fn store(&self) -> &FragmentStore {
        &self.store
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Move to a lock-guarded session usable from several threads
    pub fn into_shared(self) -> SharedSession {
        SharedSession {
            registry: Arc::new(self.registry),
            demux: Arc::new(self.demux),
            store: Arc::new(Mutex::new(self.store)),
            options: Arc::new(self.options),
            config: Arc::new(self.config),
        }
    }
}

/// Session whose fragment store is shared behind a lock.
///
/// Clones share the same store. Each frame holds the lock for its whole
/// decode, so all updates to one flow are applied in frame order.
#[derive(Debug, Clone)]
pub struct SharedSession {
    registry: Arc<ElementRegistry>,
    demux: Arc<HigherLayerDemux>,
    store: Arc<Mutex<FragmentStore>>,
    options: Arc<DecodeOptions>,
    config: Arc<DecoderConfig>,
}

impl SharedSession {
    fn decoder(&self) -> FrameDecoder<'_> {
        FrameDecoder {
            registry: &self.registry,
            demux: &self.demux,
            options: &self.options,
            config: &self.config,
        }
    }

    pub fn decode_frame(&self, input: &FrameInput<'_>) -> DecodeResult {
        let mut store = self.store.lock();
        self.decoder().frame(input, &mut store)
    }

    pub fn decode_mac_pdu(&self, data: &[u8]) -> DecodeResult {
        self.decode_mac_pdu_with(&FrameInput::new(data))
    }

    pub fn decode_mac_pdu_with(&self, input: &FrameInput<'_>) -> DecodeResult {
        let mut store = self.store.lock();
        self.decoder().mac_pdu(input, &mut store)
    }

    pub fn evict_idle(&self, now: Instant) -> Vec<FragmentKey> {
        match self.config.reassembly.idle_timeout() {
            Some(max_idle) => self.store.lock().evict_idle(now, max_idle),
            None => Vec::new(),
        }
    }

    /// Number of open reassembly units
    pub fn open_units(&self) -> usize {
        self.store.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::elements::codes;
    use std::thread;
    use std::time::Duration;

    const MIC: [u8; 5] = [0xF1, 0xF2, 0xF3, 0xF4, 0xF5];

    fn unicast(security: u8, tx: u32, rx: u32, chain: &[u8]) -> Vec<u8> {
        let mut pdu = vec![(security << 4) | 0x02, 0x00, 0x01];
        pdu.extend_from_slice(&rx.to_be_bytes());
        pdu.extend_from_slice(&tx.to_be_bytes());
        pdu.extend_from_slice(chain);
        pdu
    }

    // user plane flow 1, DLC IE type 3 segment with sequence number 1
    fn segment(si: u8, offset: Option<u16>, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0x30 | (si << 2), 0x01];
        if let Some(offset) = offset {
            body.extend_from_slice(&offset.to_be_bytes());
        }
        body.extend_from_slice(payload);
        let mut chain = vec![0x40 | codes::USER_PLANE_FLOW_1, body.len() as u8];
        chain.extend_from_slice(&body);
        chain
    }

    #[test]
    fn test_trailer_is_not_walked() {
        let mut session = DecodeSession::default();
        let mut frame = vec![0x47, 0x02, 0xAA, 0xBB];
        frame.extend_from_slice(&MIC);

        let result = session.decode_frame(&FrameInput::new(&frame).with_trailer(5));
        assert_eq!(result.summary.consumed, 4);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics.count(DiagnosticKind::UnknownElementType), 1);
        let mic = result.tree.find("MIC").unwrap();
        assert_eq!((mic.offset, mic.length), (4, 5));
    }

    #[test]
    fn test_trailer_larger_than_frame() {
        let mut session = DecodeSession::default();
        let frame = [0xC0, 0x00];
        let result = session.decode_frame(&FrameInput::new(&frame).with_trailer(5));

        assert_eq!(result.summary.elements, 0);
        assert_eq!(result.diagnostics.count(DiagnosticKind::TruncatedInput), 1);
    }

    #[test]
    fn test_declared_length_beyond_capture() {
        let mut session = DecodeSession::default();
        let frame = [0xC0, 0xC0];
        let result = session.decode_frame(&FrameInput::new(&frame).with_range(1, 10));

        assert_eq!(result.diagnostics.count(DiagnosticKind::TruncatedInput), 1);
        assert_eq!(result.summary.elements, 1);
        assert_eq!(result.summary.consumed, 1);
    }

    #[test]
    fn test_mac_pdu_with_security_reserves_mic() {
        let mut session = DecodeSession::default();
        let mut pdu = unicast(1, 0x11, 0x22, &[0xC0]);
        pdu.extend_from_slice(&MIC);

        let result = session.decode_mac_pdu(&pdu);
        let header = result.mac_header.unwrap();
        assert_eq!(header.transmitter(), Some(0x11));
        assert_eq!(result.summary.elements, 1);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.tree.find("MIC").unwrap().offset, 12);
    }

    #[test]
    fn test_mac_pdu_mic_length_from_config() {
        let mut config = DecoderConfig::default();
        config.security.mic_length = 2;
        let mut session = DecodeSession::new(config);
        let pdu = unicast(2, 1, 2, &[0xC0, 0xEE, 0xEE]);

        let result = session.decode_mac_pdu(&pdu);
        assert_eq!(result.summary.consumed, 1);
        assert_eq!(result.tree.find("MIC").unwrap().length, 2);
    }

    #[test]
    fn test_escape_header_is_not_walked() {
        let mut session = DecodeSession::default();
        let result = session.decode_mac_pdu(&[0x0F, 0xC0, 0xC0]);

        assert_eq!(result.summary.elements, 0);
        assert_eq!(result.diagnostics.count(DiagnosticKind::UnknownElementType), 1);
        assert_eq!(result.tree.find("Undecoded").unwrap().length, 2);
    }

    #[test]
    fn test_reassembly_keys_use_header_ids() {
        let mut session = DecodeSession::default();
        session.decode_mac_pdu(&unicast(0, 7, 9, &segment(1, None, &[0xAA])));

        // same sequence number from another transmitter is a different unit
        let other = session.decode_mac_pdu(&unicast(0, 8, 9, &segment(2, Some(1), &[0xBB])));
        assert_eq!(other.diagnostics.count(DiagnosticKind::ReassemblyOrphanSegment), 1);

        let done = session.decode_mac_pdu(&unicast(0, 7, 9, &segment(2, Some(1), &[0xCC])));
        assert_eq!(&done.delivered[0].data[..], &[0xAA, 0xCC]);
        assert_eq!(done.delivered[0].key.transmitter, 7);
        assert_eq!(done.delivered[0].key.receiver, 9);
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_data_header_ids_come_from_input() {
        let mut session = DecodeSession::default();
        // Data header carries no ids; same SN from two transmitters
        let data_pdu = |chain: &[u8]| {
            let mut pdu = vec![0x00, 0x00, 0x01];
            pdu.extend_from_slice(chain);
            pdu
        };
        let first_a = data_pdu(&segment(1, None, &[0xA1]));
        let first_b = data_pdu(&segment(1, None, &[0xB1]));
        let last_a = data_pdu(&segment(2, Some(1), &[0xA2]));

        let a = session.decode_mac_pdu_with(&FrameInput::new(&first_a).with_ids(0x0A, 0x99));
        let b = session.decode_mac_pdu_with(&FrameInput::new(&first_b).with_ids(0x0B, 0x99));
        assert!(a.diagnostics.is_empty());
        assert!(b.diagnostics.is_empty());
        assert_eq!(session.store().len(), 2);

        let done = session.decode_mac_pdu_with(&FrameInput::new(&last_a).with_ids(0x0A, 0x99));
        assert!(done.diagnostics.is_empty());
        assert_eq!(&done.delivered[0].data[..], &[0xA1, 0xA2]);
        assert_eq!(done.delivered[0].key.transmitter, 0x0A);
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn test_header_ids_win_over_input() {
        let mut session = DecodeSession::default();
        let pdu = unicast(0, 7, 9, &segment(1, None, &[0xAA]));
        session.decode_mac_pdu_with(&FrameInput::new(&pdu).with_ids(1, 2));

        let last = unicast(0, 7, 9, &segment(2, Some(1), &[0xBB]));
        let done = session.decode_mac_pdu(&last);
        assert_eq!(&done.delivered[0].data[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_evict_idle_follows_config() {
        let mut session = DecodeSession::default();
        session.decode_mac_pdu(&unicast(0, 1, 2, &segment(1, None, &[0xAA])));
        let later = Instant::now() + Duration::from_secs(60);
        assert!(session.evict_idle(later).is_empty());

        let mut config = DecoderConfig::default();
        config.reassembly.idle_timeout_ms = 100;
        let mut session = DecodeSession::new(config);
        session.decode_mac_pdu(&unicast(0, 1, 2, &segment(1, None, &[0xAA])));
        let evicted = session.evict_idle(later);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].sequence, 1);
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_shared_session_across_threads() {
        let shared = DecodeSession::default().into_shared();

        let handles: Vec<_> = (0..4u32)
            .map(|tx| {
                let session = shared.clone();
                thread::spawn(move || {
                    session.decode_mac_pdu(&unicast(0, tx, 0xFF, &segment(1, None, &[tx as u8])));
                    session.decode_mac_pdu(&unicast(0, tx, 0xFF, &segment(2, Some(1), &[0xEE])))
                })
            })
            .collect();

        for (tx, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap();
            assert_eq!(result.delivered.len(), 1);
            assert_eq!(&result.delivered[0].data[..], &[tx as u8, 0xEE]);
        }
        assert_eq!(shared.open_units(), 0);
    }
}
