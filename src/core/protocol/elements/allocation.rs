//! Resource allocation and random access resource IEs
//!
//! Both carry start subslot fields whose width depends on the numerology,
//! which the IE does not carry. The width is picked by
//! [`resolve`](crate::core::protocol::resolver::resolve) before any subslot
//! is read: the presence flags in the first octet(s) fix every other field,
//! so each hypothesis yields one total length to compare with the header.

use crate::core::error::DecodeError;
use crate::core::field::FieldValue;
use crate::core::protocol::registry::ElementContext;
use crate::core::protocol::resolver::{resolve, Resolution, SubslotWidth};

fn allocation_type_name(value: u64) -> &'static str {
    match value {
        0 => "Release all",
        1 => "Downlink",
        2 => "Uplink",
        _ => "Downlink and uplink",
    }
}

fn repeat_name(value: u64) -> &'static str {
    match value {
        0 => "Single allocation",
        1 => "Repeated in following frames",
        2 => "Repeated in following subslots",
        3 => "Repeated in following frames, periodic",
        4 => "Repeated in following subslots, periodic",
        _ => "Reserved",
    }
}

fn random_access_repeat_name(value: u64) -> &'static str {
    match value {
        0 => "Single allocation",
        1 => "Repeated in following frames",
        2 => "Repeated in following subslots",
        _ => "Reserved",
    }
}

fn length_type_name(value: u64) -> &'static str {
    if value == 0 {
        "Subslots"
    } else {
        "Slots"
    }
}

fn record_resolution(ctx: &mut ElementContext<'_, '_>, resolution: &Resolution) {
    let how = if resolution.inferred { "inferred" } else { "configured" };
    let bits = resolution.width.bits();
    let offset = ctx.cursor.position();
    ctx.out.tree.add(
        "Start subslot width",
        FieldValue::named(bits, format!("{bits} bits ({how})")),
        offset,
        0,
    );
}

fn start_subslot(ctx: &mut ElementContext<'_, '_>, width: SubslotWidth) -> Result<u64, DecodeError> {
    let value = match width {
        SubslotWidth::Bits8 => ctx.bits("Start subslot", 0, 8)?,
        SubslotWidth::Bits9 => {
            ctx.reserved(0, 7)?;
            ctx.bits("Start subslot", 7, 9)?
        }
    };
    ctx.advance(width.octets())?;
    Ok(value)
}

fn channel(ctx: &mut ElementContext<'_, '_>, label: &str) -> Result<(), DecodeError> {
    ctx.reserved(0, 3)?;
    ctx.bits(label, 3, 13)?;
    ctx.advance(2)
}

fn repetition(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.u8("Repetition")?;
    ctx.u8("Validity")?;
    Ok(())
}

pub fn resource_allocation(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    let allocation = ctx.named_bits("Allocation type", 0, 2, allocation_type_name)?;
    if allocation == 0 {
        ctx.reserved(2, 6)?;
        return ctx.advance(1);
    }
    ctx.flag("Add", 2)?;
    let id = ctx.flag("Short RD ID present", 3)?;
    let repeat = ctx.named_bits("Repeat", 4, 3, repeat_name)?;
    let sfn = ctx.flag("SFN offset present", 7)?;
    ctx.advance(1)?;

    let channel_present = ctx.flag("Channel present", 0)?;
    let rlf = ctx.flag("DECT scheduled resource failure present", 1)?;
    ctx.reserved(2, 6)?;
    ctx.advance(1)?;

    let directions = if allocation == 3 { 2 } else { 1 };
    let optional = 2 * usize::from(id)
        + 2 * usize::from(repeat != 0)
        + usize::from(sfn)
        + 2 * usize::from(channel_present)
        + usize::from(rlf);
    let layout = |width: SubslotWidth| 2 + directions * (width.octets() + 1) + optional;
    let resolution = resolve(ctx.header.declared_length, ctx.options.subslot_width, layout);
    record_resolution(ctx, &resolution);

    let labels: &[&str] = match allocation {
        1 => &["Downlink"],
        2 => &["Uplink"],
        _ => &["Downlink", "Uplink"],
    };
    for label in labels {
        let node = ctx.open(label);
        start_subslot(ctx, resolution.width)?;
        ctx.named_bits("Length type", 0, 1, length_type_name)?;
        ctx.bits("Length", 1, 7)?;
        ctx.advance(1)?;
        ctx.close(node);
    }

    if id {
        ctx.u16("Short RD ID")?;
    }
    if repeat != 0 {
        repetition(ctx)?;
    }
    if sfn {
        ctx.u8("SFN offset")?;
    }
    if channel_present {
        channel(ctx, "Channel")?;
    }
    if rlf {
        ctx.reserved(0, 4)?;
        ctx.bits("DECT scheduled resource failure", 4, 4)?;
        ctx.advance(1)?;
    }
    Ok(())
}

pub fn random_access_resource(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.reserved(0, 3)?;
    let repeat = ctx.named_bits("Repeat", 3, 2, random_access_repeat_name)?;
    let sfn = ctx.flag("SFN offset present", 5)?;
    let channel_present = ctx.flag("Channel present", 6)?;
    let channel2 = ctx.flag("Response channel present", 7)?;
    ctx.advance(1)?;

    let optional = 2 * usize::from(repeat != 0)
        + usize::from(sfn)
        + 2 * usize::from(channel_present)
        + 2 * usize::from(channel2);
    let layout = |width: SubslotWidth| 1 + width.octets() + 3 + optional;
    let resolution = resolve(ctx.header.declared_length, ctx.options.subslot_width, layout);
    record_resolution(ctx, &resolution);

    start_subslot(ctx, resolution.width)?;

    ctx.named_bits("Length type", 0, 1, length_type_name)?;
    ctx.bits("Length", 1, 7)?;
    ctx.advance(1)?;

    ctx.named_bits("Max length type", 0, 1, length_type_name)?;
    ctx.bits("Max RACH length", 1, 4)?;
    ctx.bits("CW min sig", 5, 3)?;
    ctx.advance(1)?;

    ctx.flag("DECT delay", 0)?;
    ctx.bits("Response window", 1, 4)?;
    ctx.bits("CW max sig", 5, 3)?;
    ctx.advance(1)?;

    if repeat != 0 {
        repetition(ctx)?;
    }
    if sfn {
        ctx.u8("SFN offset")?;
    }
    if channel_present {
        channel(ctx, "Channel")?;
    }
    if channel2 {
        channel(ctx, "Response channel")?;
    }
    Ok(())
}
