//! DLC PDU decoding
//!
//! Higher layer signalling and user plane flows carry one DLC PDU each. The
//! first octet's high nibble is the DLC IE type:
//!
//! | Type | Content                                              |
//! |------|------------------------------------------------------|
//! | 0    | service type 0, routing header follows               |
//! | 1    | service type 0, complete SDU                         |
//! | 2    | service type 1-3 segment header, routing header      |
//! | 3    | service type 1-3 segment header                      |
//! | 4    | DLC timers configuration                             |
//! | 14   | escape                                               |
//!
//! Segments are collected in the session's [`FragmentStore`] under the key
//! (transmitter, receiver, MAC IE type, sequence number). Complete SDUs go
//! to the higher-layer demultiplexer.
//!
//! [`FragmentStore`]: crate::core::reassembly::FragmentStore

use crate::core::demux::DeliveredSdu;
use crate::core::diagnostic::DiagnosticKind;
use crate::core::error::DecodeError;
use crate::core::field::FieldValue;
use crate::core::protocol::registry::ElementContext;
use crate::core::reassembly::{
    FragmentKey, ReassemblyWarning, Segment, SegmentOutcome, SegmentationIndicator,
};
use bytes::Bytes;

const IE_SERVICE_0_ROUTING: u64 = 0;
const IE_SERVICE_0: u64 = 1;
const IE_SEGMENTED_ROUTING: u64 = 2;
const IE_SEGMENTED: u64 = 3;
const IE_TIMERS: u64 = 4;

fn ie_type_name(value: u64) -> &'static str {
    match value {
        IE_SERVICE_0_ROUTING => "Data: DLC service type 0 with routing header",
        IE_SERVICE_0 => "Data: DLC service type 0 without routing header",
        IE_SEGMENTED_ROUTING => "Data: DLC service type 1, 2 or 3 with routing header",
        IE_SEGMENTED => "Data: DLC service type 1, 2 or 3 without routing header",
        IE_TIMERS => "DLC timers configuration control IE",
        14 => "Escape",
        _ => "Reserved",
    }
}

fn si_name(value: u64) -> &'static str {
    // two bits, every value is defined
    SegmentationIndicator::from_bits(value as u8).name()
}

fn qos_name(value: u64) -> &'static str {
    match value {
        0 => "Best effort",
        1 => "Low latency",
        2 => "Guaranteed",
        _ => "Reserved",
    }
}

fn destination_type_name(value: u64) -> &'static str {
    match value {
        0 => "Unicast address follows",
        1 => "Broadcast",
        2 => "Backhaul route to sink",
        3 => "Uplink to sink",
        _ => "Reserved",
    }
}

fn routing_type_name(value: u64) -> &'static str {
    match value {
        0 => "Uplink",
        1 => "Downlink",
        2 => "Local",
        _ => "Reserved",
    }
}

/// Decoder for every DLC-carrying flow
pub fn dlc_pdu(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    let ie_type = ctx.named_bits("DLC IE type", 0, 4, ie_type_name)?;
    match ie_type {
        IE_SERVICE_0_ROUTING | IE_SERVICE_0 => {
            ctx.reserved(4, 4)?;
            ctx.advance(1)?;
            if ie_type == IE_SERVICE_0_ROUTING {
                routing_header(ctx)?;
            }
            sdu(ctx, SegmentationIndicator::Complete, 0, None)
        }
        IE_SEGMENTED_ROUTING | IE_SEGMENTED => {
            let si = ctx.named_bits("Segmentation indication", 4, 2, si_name)?;
            let sequence = ctx.bits("Sequence number", 6, 10)?;
            ctx.advance(2)?;
            let indicator = SegmentationIndicator::from_bits(si as u8);
            let offset = if indicator.carries_offset() {
                Some(ctx.u16("Segmentation offset")?)
            } else {
                None
            };
            if ie_type == IE_SEGMENTED_ROUTING {
                routing_header(ctx)?;
            }
            // ten-bit field
            sdu(ctx, indicator, sequence as u16, offset)
        }
        IE_TIMERS => {
            ctx.reserved(4, 4)?;
            ctx.advance(1)?;
            ctx.u8("SDU lifetime timer")?;
            Ok(())
        }
        _ => {
            ctx.reserved(4, 4)?;
            ctx.advance(1)?;
            ctx.bytes("DLC payload", ctx.remaining_in_element())?;
            Ok(())
        }
    }
}

fn routing_header(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    let node = ctx.open("Routing header");
    let result = routing_fields(ctx);
    ctx.close(node);
    result
}

fn routing_fields(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.named_bits("QoS", 0, 3, qos_name)?;
    let delay = ctx.flag("Delay present", 3)?;
    let hops = ctx.flag("Hop count/limit present", 4)?;
    let destination = ctx.named_bits("Destination address type", 5, 3, destination_type_name)?;
    let source = ctx.flag("Source address present", 8)?;
    ctx.named_bits("Routing type", 9, 3, routing_type_name)?;
    ctx.reserved(12, 4)?;
    ctx.advance(2)?;

    if source {
        ctx.id32("Source address")?;
    }
    if destination == 0 {
        ctx.id32("Destination address")?;
    }
    if hops {
        ctx.u8("Hop count")?;
        ctx.u8("Hop limit")?;
    }
    if delay {
        ctx.u8("Delay")?;
    }
    Ok(())
}

fn sdu(
    ctx: &mut ElementContext<'_, '_>,
    indicator: SegmentationIndicator,
    sequence: u16,
    offset: Option<u16>,
) -> Result<(), DecodeError> {
    let start = ctx.cursor.position();
    let payload = ctx.payload()?;
    let range = start..start + payload.len();

    let key = FragmentKey {
        transmitter: ctx.parse.transmitter,
        receiver: ctx.parse.receiver,
        element_type: ctx.header.type_code,
        sequence,
    };
    let segment = Segment {
        indicator,
        offset,
        payload,
    };

    let report = ctx.store.add_segment(key, segment);
    for warning in &report.warnings {
        let (kind, message) = match *warning {
            ReassemblyWarning::OrphanSegment => (
                DiagnosticKind::ReassemblyOrphanSegment,
                format!("{} segment for {key} with no open unit", indicator.name()),
            ),
            ReassemblyWarning::Overwrite { discarded } => (
                DiagnosticKind::ReassemblyOverwrite,
                format!("first segment for {key} discarded {discarded} collected bytes"),
            ),
            ReassemblyWarning::OffsetMismatch { expected, actual } => (
                DiagnosticKind::ReassemblySegmentOffset,
                format!("segment offset {actual} for {key}, {expected} bytes collected"),
            ),
            ReassemblyWarning::Evicted { key: evicted, discarded } => (
                DiagnosticKind::ReassemblyEvicted,
                format!("unit {evicted} dropped for capacity, {discarded} bytes lost"),
            ),
        };
        ctx.out.diagnostics.report(kind, range.clone(), message);
    }

    match report.outcome {
        SegmentOutcome::Completed(data) if indicator == SegmentationIndicator::Complete => {
            deliver(ctx, key, data, false, start);
        }
        SegmentOutcome::Completed(data) => {
            ctx.out.tree.add_bytes("Segment", payload, start);
            deliver(ctx, key, data, true, 0);
        }
        SegmentOutcome::Incomplete | SegmentOutcome::Orphan => {
            ctx.out.tree.add_bytes("Segment", payload, start);
            if let Some(acc) = ctx.store.get(&key) {
                ctx.out.tree.add(
                    "Reassembly",
                    FieldValue::Text(format!("{} bytes in {} segments", acc.len(), acc.segments())),
                    start,
                    0,
                );
            }
        }
    }
    Ok(())
}

/// Hand a complete SDU to the demultiplexer. Reassembled SDUs are labelled
/// relative to their own first byte since they do not exist in the frame.
fn deliver(ctx: &mut ElementContext<'_, '_>, key: FragmentKey, data: Bytes, reassembled: bool, base: usize) {
    let label = if reassembled { "Reassembled SDU" } else { "SDU" };
    let node = ctx.out.tree.open(label, base);
    let hint = ctx.options.payload_class.as_deref();
    let dispatched = ctx.demux.dispatch(&data, hint, base, &mut ctx.out.tree);
    ctx.out.tree.close(node, base + data.len());

    if let Some(error) = dispatched.error {
        ctx.out.diagnostics.report(
            DiagnosticKind::TruncatedInput,
            base..base + data.len(),
            format!("{} payload: {error}", dispatched.handler),
        );
    }
    ctx.out.delivered.push(DeliveredSdu {
        key,
        reassembled,
        handler: dispatched.handler.to_string(),
        data,
    });
}
