//! Network and cluster beacon messages

use crate::core::error::DecodeError;
use crate::core::protocol::registry::ElementContext;

fn network_period_name(value: u64) -> &'static str {
    match value {
        0 => "50 ms",
        1 => "100 ms",
        2 => "500 ms",
        3 => "1000 ms",
        4 => "1500 ms",
        5 => "2000 ms",
        6 => "4000 ms",
        _ => "Reserved",
    }
}

fn cluster_period_name(value: u64) -> &'static str {
    match value {
        0 => "10 ms",
        1 => "50 ms",
        2 => "100 ms",
        3 => "500 ms",
        4 => "1000 ms",
        5 => "1500 ms",
        6 => "2000 ms",
        7 => "4000 ms",
        8 => "8000 ms",
        9 => "16000 ms",
        10 => "32000 ms",
        _ => "Reserved",
    }
}

fn quality_name(value: u64) -> &'static str {
    match value {
        0 => "3 dB",
        1 => "6 dB",
        2 => "9 dB",
        _ => "12 dB",
    }
}

fn trigger_name(value: u64) -> &'static str {
    match value {
        0 => "Reserved",
        1..=7 => "Count",
        _ => "Extended count",
    }
}

/// Three reserved bits then a 13-bit channel number
fn channel(ctx: &mut ElementContext<'_, '_>, label: &str) -> Result<u64, DecodeError> {
    ctx.reserved(0, 3)?;
    let value = ctx.bits(label, 3, 13)?;
    ctx.advance(2)?;
    Ok(value)
}

fn max_tx_power(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.reserved(0, 4)?;
    ctx.bits("Clusters max TX power", 4, 4)?;
    ctx.advance(1)
}

pub fn network_beacon(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.reserved(0, 3)?;
    let tx_power = ctx.flag("TX power present", 3)?;
    ctx.flag("Power constraints", 4)?;
    let current = ctx.flag("Current cluster channel present", 5)?;
    let extra = ctx.bits("Network beacon channels", 6, 2)?;
    ctx.advance(1)?;

    ctx.named_bits("Network beacon period", 0, 4, network_period_name)?;
    ctx.named_bits("Cluster beacon period", 4, 4, cluster_period_name)?;
    ctx.advance(1)?;

    channel(ctx, "Next cluster channel")?;
    ctx.bits("Time to next", 0, 32)?;
    ctx.advance(4)?;

    if tx_power {
        max_tx_power(ctx)?;
    }
    if current {
        channel(ctx, "Current cluster channel")?;
    }
    for _ in 0..extra {
        channel(ctx, "Additional network beacon channel")?;
    }
    Ok(())
}

pub fn cluster_beacon(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.u8("System frame number")?;

    ctx.reserved(0, 3)?;
    let tx_power = ctx.flag("TX power present", 3)?;
    ctx.flag("Power constraints", 4)?;
    let frame_offset = ctx.flag("Frame offset present", 5)?;
    let next_channel = ctx.flag("Next channel present", 6)?;
    let time_to_next = ctx.flag("Time to next present", 7)?;
    ctx.advance(1)?;

    ctx.named_bits("Network beacon period", 0, 4, network_period_name)?;
    ctx.named_bits("Cluster beacon period", 4, 4, cluster_period_name)?;
    ctx.advance(1)?;

    ctx.named_bits("Count to trigger", 0, 4, trigger_name)?;
    ctx.named_bits("Relative quality", 4, 2, quality_name)?;
    ctx.named_bits("Minimum quality", 6, 2, quality_name)?;
    ctx.advance(1)?;

    if tx_power {
        max_tx_power(ctx)?;
    }
    if frame_offset {
        ctx.u8("Frame offset")?;
    }
    if next_channel {
        channel(ctx, "Next cluster channel")?;
    }
    if time_to_next {
        ctx.bits("Time to next", 0, 32)?;
        ctx.advance(4)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::codes;
    use super::super::testing::{assert_clean, element, value, walk};
    use crate::core::diagnostic::DiagnosticKind;
    use crate::core::field::FieldValue;

    #[test]
    fn test_network_beacon_optional_fields() {
        // tx power, current channel, one additional channel
        let payload = [
            0b0001_0101, 0x23, 0x00, 0x10, 0x00, 0x00, 0x01, 0x00, 0x07, 0x00, 0x20, 0x00, 0x30,
        ];
        let frame = element(codes::NETWORK_BEACON, &payload);
        let (summary, out) = walk(&frame);

        assert_eq!(summary.consumed, frame.len());
        assert_clean(&out);
        assert_eq!(
            out.tree.find("Network beacon period").unwrap().value,
            FieldValue::named(2u8, "500 ms")
        );
        assert_eq!(value(&out, "Next cluster channel"), 0x10);
        assert_eq!(value(&out, "Time to next"), 0x100);
        assert_eq!(value(&out, "Clusters max TX power"), 7);
        assert_eq!(value(&out, "Current cluster channel"), 0x20);
        assert_eq!(value(&out, "Additional network beacon channel"), 0x30);
    }

    #[test]
    fn test_cluster_beacon_minimal() {
        let frame = element(codes::CLUSTER_BEACON, &[0x2A, 0x00, 0x11, 0x15]);
        let (summary, out) = walk(&frame);

        assert_eq!(summary.consumed, 6);
        assert_clean(&out);
        assert_eq!(value(&out, "System frame number"), 42);
        assert_eq!(value(&out, "Count to trigger"), 1);
        assert_eq!(value(&out, "Relative quality"), 1);
        assert_eq!(value(&out, "Minimum quality"), 1);
    }

    #[test]
    fn test_cluster_beacon_all_optional() {
        let payload = [0x01, 0x1F, 0x11, 0x10, 0x05, 0x03, 0x00, 0x42, 0x00, 0x00, 0x00, 0x64];
        let frame = element(codes::CLUSTER_BEACON, &payload);
        let (summary, out) = walk(&frame);

        assert_eq!(summary.consumed, frame.len());
        assert_clean(&out);
        assert_eq!(value(&out, "Frame offset"), 3);
        assert_eq!(value(&out, "Next cluster channel"), 0x42);
        assert_eq!(value(&out, "Time to next"), 100);
    }

    #[test]
    fn test_truncated_beacon_ends_chain() {
        // implicit encoding, frame ends inside the fixed part
        let frame = [codes::NETWORK_BEACON, 0x00, 0x23];
        let (summary, out) = walk(&frame);

        assert!(summary.ended_early);
        assert_eq!(out.diagnostics.count(DiagnosticKind::TruncatedInput), 1);
    }
}
