//! Higher-layer demultiplexer
//!
//! A DLC SDU (complete, or reassembled from segments) is handed to exactly
//! one collaborator: the class named by configuration, else the first
//! registered decoder that recognizes the bytes, else the raw data sink.

use super::cursor::ByteCursor;
use super::error::DecodeError;
use super::field::{FieldTree, FieldValue};
use super::reassembly::FragmentKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

/// Name reported when no collaborator claimed an SDU
pub const RAW_SINK: &str = "data";

/// Decoder for a higher-layer payload
#[cfg_attr(test, mockall::automock)]
pub trait SduDecoder: Send + Sync {
    /// Class name, matched against the configured payload class
    fn name(&self) -> &'static str;

    /// Whether the bytes look like this class
    fn recognizes(&self, sdu: &[u8]) -> bool;

    /// Add fields for `sdu`; `base` is the absolute offset of its first byte
    fn decode(&self, sdu: &[u8], base: usize, tree: &mut FieldTree) -> Result<(), DecodeError>;
}

/// An SDU handed upward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredSdu {
    /// Flow the SDU belongs to
    pub key: FragmentKey,
    /// Built from more than one segment
    pub reassembled: bool,
    /// Collaborator that took it
    pub handler: String,
    pub data: Bytes,
}

/// How a collaborator was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Configured,
    Recognized,
    Raw,
}

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub handler: &'static str,
    pub selection: Selection,
    /// Collaborator failure; the SDU is still considered delivered
    pub error: Option<DecodeError>,
}

/// Collaborator table
#[derive(Default)]
pub struct HigherLayerDemux {
    decoders: Vec<Box<dyn SduDecoder>>,
}

impl std::fmt::Debug for HigherLayerDemux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.decoders.iter().map(|d| d.name()).collect();
        f.debug_struct("HigherLayerDemux").field("decoders", &names).finish()
    }
}

impl HigherLayerDemux {
    /// No collaborators; everything goes to the raw sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in collaborators
    pub fn standard() -> Self {
        let mut demux = Self::new();
        demux.register(Ipv6Summary);
        demux
    }

    /// Add a collaborator; checked in registration order
    pub fn register<D: SduDecoder + 'static>(&mut self, decoder: D) {
        self.decoders.push(Box::new(decoder));
    }

    /// Registered class names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.iter().map(|d| d.name())
    }

    fn select(&self, sdu: &[u8], hint: Option<&str>) -> Option<(&dyn SduDecoder, Selection)> {
        if let Some(class) = hint {
            match self.decoders.iter().find(|d| d.name() == class) {
                Some(d) => return Some((d.as_ref(), Selection::Configured)),
                None => tracing::warn!(class, "configured payload class is not registered"),
            }
        }
        self.decoders
            .iter()
            .find(|d| d.recognizes(sdu))
            .map(|d| (d.as_ref(), Selection::Recognized))
    }

    /// Forward `sdu` to one collaborator and record its fields
    pub fn dispatch(&self, sdu: &[u8], hint: Option<&str>, base: usize, tree: &mut FieldTree) -> Dispatched {
        let Some((decoder, selection)) = self.select(sdu, hint) else {
            tree.add_bytes("Data", sdu, base);
            return Dispatched {
                handler: RAW_SINK,
                selection: Selection::Raw,
                error: None,
            };
        };

        let handler = decoder.name();
        tracing::debug!(handler, ?selection, len = sdu.len(), "sdu dispatched");
        let node = tree.open(handler, base);
        let error = decoder.decode(sdu, base, tree).err();
        tree.close(node, base + sdu.len());
        Dispatched {
            handler,
            selection,
            error,
        }
    }
}

/// Labels the fixed IPv6 header of an SDU
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv6Summary;

const IPV6_HEADER_LEN: usize = 40;

impl SduDecoder for Ipv6Summary {
    fn name(&self) -> &'static str {
        "ipv6"
    }

    fn recognizes(&self, sdu: &[u8]) -> bool {
        sdu.len() >= IPV6_HEADER_LEN && sdu[0] >> 4 == 6
    }

    fn decode(&self, sdu: &[u8], base: usize, tree: &mut FieldTree) -> Result<(), DecodeError> {
        let mut cursor = ByteCursor::new(sdu);
        tree.add_uint("Version", cursor.read(4, 0)?, base, 1);
        tree.add_uint("Traffic class", cursor.read(8, 4)?, base, 2);
        tree.add_uint("Flow label", cursor.read(20, 12)?, base + 1, 3);
        cursor.skip(4)?;
        tree.add_uint("Payload length", cursor.read_u16()?, base + 4, 2);
        tree.add_uint("Next header", cursor.read_u8()?, base + 6, 1);
        tree.add_uint("Hop limit", cursor.read_u8()?, base + 7, 1);
        for label in ["Source", "Destination"] {
            let offset = cursor.position();
            let raw = cursor.read_bytes(16)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            tree.add(label, FieldValue::Text(Ipv6Addr::from(octets).to_string()), base + offset, 16);
        }
        if !cursor.is_empty() {
            let offset = cursor.position();
            tree.add_bytes("Payload", cursor.rest(), base + offset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv6_packet() -> Vec<u8> {
        let mut packet = vec![0x60, 0x00, 0x00, 0x00, 0x00, 0x02, 0x11, 0x40];
        packet.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        packet.extend_from_slice(&"fe80::1".parse::<Ipv6Addr>().unwrap().octets());
        packet.extend_from_slice(&[0xAB, 0xCD]);
        packet
    }

    #[test]
    fn test_unclaimed_goes_to_raw_sink() {
        let demux = HigherLayerDemux::new();
        let mut tree = FieldTree::new();
        let d = demux.dispatch(&[1, 2, 3], None, 10, &mut tree);

        assert_eq!(d.handler, RAW_SINK);
        assert_eq!(d.selection, Selection::Raw);
        let node = tree.find("Data").unwrap();
        assert_eq!((node.offset, node.length), (10, 3));
    }

    #[test]
    fn test_ipv6_summary_recognized_with_fields() {
        let demux = HigherLayerDemux::standard();
        let mut tree = FieldTree::new();
        let d = demux.dispatch(&ipv6_packet(), None, 0, &mut tree);

        assert_eq!(d.handler, "ipv6");
        assert_eq!(d.selection, Selection::Recognized);
        assert!(d.error.is_none());
        assert_eq!(tree.find("Next header").unwrap().value, FieldValue::Unsigned(0x11));
        assert_eq!(tree.find("Source").unwrap().value, FieldValue::Text("::1".into()));
        assert_eq!(tree.find("Destination").unwrap().offset, 24);
        assert_eq!(tree.find("Payload").unwrap().length, 2);
    }

    #[test]
    fn test_configured_class_skips_recognition() {
        let mut heuristic = MockSduDecoder::new();
        heuristic.expect_name().return_const("heuristic");
        heuristic.expect_recognizes().never();
        heuristic.expect_decode().never();

        let mut forced = MockSduDecoder::new();
        forced.expect_name().return_const("forced");
        forced.expect_recognizes().never();
        forced.expect_decode().times(1).returning(|_, _, _| Ok(()));

        let mut demux = HigherLayerDemux::new();
        demux.register(heuristic);
        demux.register(forced);

        let mut tree = FieldTree::new();
        let d = demux.dispatch(&[0xFF], Some("forced"), 0, &mut tree);
        assert_eq!(d.handler, "forced");
        assert_eq!(d.selection, Selection::Configured);
    }

    #[test]
    fn test_first_recognizing_decoder_wins() {
        let mut declines = MockSduDecoder::new();
        declines.expect_name().return_const("declines");
        declines.expect_recognizes().times(1).return_const(false);

        let mut claims = MockSduDecoder::new();
        claims.expect_name().return_const("claims");
        claims.expect_recognizes().times(1).return_const(true);
        claims
            .expect_decode()
            .times(1)
            .returning(|_, _, _| Err(DecodeError::TruncatedInput { offset: 0, needed: 2, available: 1 }));

        let mut later = MockSduDecoder::new();
        later.expect_name().return_const("later");
        later.expect_recognizes().never();

        let mut demux = HigherLayerDemux::new();
        demux.register(declines);
        demux.register(claims);
        demux.register(later);

        let mut tree = FieldTree::new();
        let d = demux.dispatch(&[0x00], Some("missing"), 0, &mut tree);
        assert_eq!(d.handler, "claims");
        assert_eq!(d.selection, Selection::Recognized);
        assert!(d.error.unwrap().is_truncation());
    }
}
