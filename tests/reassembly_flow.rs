//! DLC segments carried across several MAC PDUs

use nrdissect_core::{DecodeSession, DecoderConfig, DiagnosticKind, FieldValue, FrameInput};
use std::net::Ipv6Addr;
use std::thread;

const USER_PLANE_FLOW_1: u8 = 3;

fn unicast(tx: u32, rx: u32, chain: &[u8]) -> Vec<u8> {
    let mut pdu = vec![0x02, 0x00, 0x01];
    pdu.extend_from_slice(&rx.to_be_bytes());
    pdu.extend_from_slice(&tx.to_be_bytes());
    pdu.extend_from_slice(chain);
    pdu
}

/// User plane flow 1 element holding one DLC segment
fn segment(si: u8, sequence: u16, offset: Option<u16>, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x30 | (si << 2) | ((sequence >> 8) as u8 & 0x03), sequence as u8];
    if let Some(offset) = offset {
        body.extend_from_slice(&offset.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let mut element = vec![0x40 | USER_PLANE_FLOW_1, body.len() as u8];
    element.extend_from_slice(&body);
    element
}

fn ipv6_packet() -> Vec<u8> {
    let mut packet = vec![0x60, 0x00, 0x00, 0x00, 0x00, 0x03, 0x11, 0x40];
    packet.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
    packet.extend_from_slice(&"fd00::2".parse::<Ipv6Addr>().unwrap().octets());
    packet.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    packet
}

#[test]
fn test_ipv6_packet_over_three_pdus() {
    let mut session = DecodeSession::default();
    let packet = ipv6_packet();
    let (first, rest) = packet.split_at(20);
    let (middle, last) = rest.split_at(15);

    let r1 = session.decode_mac_pdu(&unicast(0x100, 0x200, &segment(1, 0x102, None, first)));
    assert!(r1.delivered.is_empty());
    assert!(r1.diagnostics.is_empty());

    let r2 = session.decode_mac_pdu(&unicast(0x100, 0x200, &segment(3, 0x102, Some(20), middle)));
    assert!(r2.delivered.is_empty());
    assert!(r2.diagnostics.is_empty());

    let r3 = session.decode_mac_pdu(&unicast(0x100, 0x200, &segment(2, 0x102, Some(35), last)));
    assert!(r3.diagnostics.is_empty());
    assert_eq!(r3.delivered.len(), 1);

    let sdu = &r3.delivered[0];
    assert!(sdu.reassembled);
    assert_eq!(sdu.handler, "ipv6");
    assert_eq!(sdu.key.sequence, 0x102);
    assert_eq!(&sdu.data[..], &packet[..]);

    // reassembled fields are numbered from the start of the SDU
    let source = r3.tree.find("Source").unwrap();
    assert_eq!(source.offset, 8);
    assert_eq!(source.value, FieldValue::Text("::1".to_string()));
    assert!(r3.tree.find("Reassembled SDU").is_some());
    assert!(session.store().is_empty());
}

#[test]
fn test_interleaved_units_from_one_transmitter() {
    let mut session = DecodeSession::default();

    session.decode_mac_pdu(&unicast(1, 2, &segment(1, 10, None, &[0x01])));
    session.decode_mac_pdu(&unicast(1, 2, &segment(1, 11, None, &[0x11])));
    assert_eq!(session.store().len(), 2);

    let done_11 = session.decode_mac_pdu(&unicast(1, 2, &segment(2, 11, Some(1), &[0x12])));
    assert_eq!(&done_11.delivered[0].data[..], &[0x11, 0x12]);

    let done_10 = session.decode_mac_pdu(&unicast(1, 2, &segment(2, 10, Some(1), &[0x02])));
    assert_eq!(&done_10.delivered[0].data[..], &[0x01, 0x02]);
    assert!(session.store().is_empty());
}

/// Data header: no ids on the air, SN 1
fn data_pdu(chain: &[u8]) -> Vec<u8> {
    let mut pdu = vec![0x00, 0x00, 0x01];
    pdu.extend_from_slice(chain);
    pdu
}

#[test]
fn test_data_header_flows_keyed_by_host_ids() {
    let mut session = DecodeSession::default();
    let first_a = data_pdu(&segment(1, 5, None, &[0xA0, 0xA1]));
    let first_b = data_pdu(&segment(1, 5, None, &[0xB0]));
    let last_b = data_pdu(&segment(2, 5, Some(1), &[0xB1]));
    let last_a = data_pdu(&segment(2, 5, Some(2), &[0xA2]));

    let r = session.decode_mac_pdu_with(&FrameInput::new(&first_a).with_ids(0xA, 0x1));
    assert!(r.diagnostics.is_empty());
    let r = session.decode_mac_pdu_with(&FrameInput::new(&first_b).with_ids(0xB, 0x1));
    assert_eq!(r.diagnostics.count(DiagnosticKind::ReassemblyOverwrite), 0);
    assert_eq!(session.store().len(), 2);

    let done_b = session.decode_mac_pdu_with(&FrameInput::new(&last_b).with_ids(0xB, 0x1));
    assert_eq!(&done_b.delivered[0].data[..], &[0xB0, 0xB1]);
    let done_a = session.decode_mac_pdu_with(&FrameInput::new(&last_a).with_ids(0xA, 0x1));
    assert!(done_a.diagnostics.is_empty());
    assert_eq!(&done_a.delivered[0].data[..], &[0xA0, 0xA1, 0xA2]);
    assert!(session.store().is_empty());
}

#[test]
fn test_two_segments_in_one_pdu() {
    let mut session = DecodeSession::default();
    let mut chain = segment(1, 7, None, &[0xA0, 0xA1]);
    chain.extend(segment(2, 7, Some(2), &[0xA2]));

    let result = session.decode_mac_pdu(&unicast(5, 6, &chain));
    assert_eq!(result.summary.elements, 2);
    assert_eq!(result.delivered.len(), 1);
    assert_eq!(&result.delivered[0].data[..], &[0xA0, 0xA1, 0xA2]);
}

#[test]
fn test_orphan_last_segment_then_recovery() {
    let mut session = DecodeSession::default();

    let orphan = session.decode_mac_pdu(&unicast(1, 2, &segment(2, 3, Some(4), &[0xFF])));
    assert_eq!(orphan.diagnostics.count(DiagnosticKind::ReassemblyOrphanSegment), 1);
    assert!(session.store().is_empty());

    session.decode_mac_pdu(&unicast(1, 2, &segment(1, 3, None, &[0x01])));
    let done = session.decode_mac_pdu(&unicast(1, 2, &segment(2, 3, Some(1), &[0x02])));
    assert!(done.diagnostics.is_empty());
    assert_eq!(&done.delivered[0].data[..], &[0x01, 0x02]);
}

#[test]
fn test_store_limit_from_config() {
    let mut config = DecoderConfig::default();
    config.reassembly.max_accumulators = 2;
    let mut session = DecodeSession::new(config);

    let mut evictions = 0;
    for sequence in 0..5 {
        let r = session.decode_mac_pdu(&unicast(1, 2, &segment(1, sequence, None, &[0x00])));
        evictions += r.diagnostics.count(DiagnosticKind::ReassemblyEvicted);
    }
    assert_eq!(session.store().len(), 2);
    assert_eq!(evictions, 3);
}

#[test]
fn test_shared_session_interleaved_threads() {
    let shared = DecodeSession::default().into_shared();

    let handles: Vec<_> = (0..8u32)
        .map(|tx| {
            let session = shared.clone();
            thread::spawn(move || {
                let payload = [tx as u8; 3];
                session.decode_mac_pdu(&unicast(tx, 0xFFFF_FFFE, &segment(1, 1, None, &payload[..2])));
                session.decode_mac_pdu(&unicast(tx, 0xFFFF_FFFE, &segment(2, 1, Some(2), &payload[2..])))
            })
        })
        .collect();

    for (tx, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert_eq!(&result.delivered[0].data[..], &[tx as u8; 3]);
        assert_eq!(result.delivered[0].key.transmitter, tx as u32);
    }
    assert_eq!(shared.open_units(), 0);
}
