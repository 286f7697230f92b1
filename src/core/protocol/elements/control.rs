//! Padding, security, routing and release elements, plus the short IEs

use crate::core::error::DecodeError;
use crate::core::protocol::registry::ElementContext;

fn release_cause_name(value: u64) -> &'static str {
    match value {
        0 => "Connection termination",
        1 => "Mobility",
        2 => "Long inactivity",
        3 => "Incompatible configuration",
        4 => "Not enough HW or memory resources",
        5 => "Not enough radio resources",
        6 => "Bad radio quality",
        7 => "Security error",
        _ => "Reserved",
    }
}

fn security_version_name(value: u64) -> &'static str {
    match value {
        0 => "Mode 1",
        _ => "Reserved",
    }
}

fn iv_type_name(value: u64) -> &'static str {
    match value {
        0 => "One time HPC",
        1 => "Resynchronizing HPC",
        2 => "One time HPC with HPC request",
        _ => "Reserved",
    }
}

fn indication_type_name(value: u64) -> &'static str {
    match value {
        0 => "Paging",
        1 => "Random access response",
        _ => "Reserved",
    }
}

fn feedback_name(value: u64) -> &'static str {
    match value {
        0 => "No feedback",
        1 => "MCS",
        2 => "MIMO 2 antennas",
        _ => "MIMO 4 antennas",
    }
}

fn status_flag_name(value: u64) -> &'static str {
    match value {
        1 => "Memory full",
        2 => "Normal operation resumed",
        _ => "Reserved",
    }
}

fn duration_name(value: u64) -> &'static str {
    match value {
        0 => "50 ms",
        1 => "100 ms",
        2 => "200 ms",
        3 => "400 ms",
        4 => "600 ms",
        5 => "800 ms",
        6 => "1000 ms",
        7 => "1500 ms",
        8 => "2000 ms",
        9 => "3000 ms",
        10 => "4000 ms",
        11 => "Unknown",
        _ => "Reserved",
    }
}

/// Fills the element to its end
pub fn padding(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.bytes("Padding", ctx.remaining_in_element())?;
    Ok(())
}

pub fn association_release(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.named_bits("Release cause", 0, 4, release_cause_name)?;
    ctx.reserved(4, 4)?;
    ctx.advance(1)
}

pub fn security_info(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.named_bits("Version", 0, 2, security_version_name)?;
    ctx.bits("Key index", 2, 2)?;
    ctx.named_bits("Security IV type", 4, 4, iv_type_name)?;
    ctx.advance(1)?;
    ctx.bits("Hyper packet counter", 0, 32)?;
    ctx.advance(4)
}

pub fn route_info(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.id32("Sink address")?;
    ctx.u8("Route cost")?;
    ctx.u8("Application sequence number")?;
    Ok(())
}

/// Paging or random access response for one RD
pub fn broadcast_indication(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.named_bits("Indication type", 0, 3, indication_type_name)?;
    let long_id = ctx.flag("Long ID", 3)?;
    ctx.flag("ACK", 4)?;
    let feedback = ctx.named_bits("Feedback", 5, 2, feedback_name)?;
    ctx.flag("Resource allocation IE follows", 7)?;
    ctx.advance(1)?;

    if long_id {
        ctx.id32("Long RD ID")?;
    } else {
        ctx.u16("Short RD ID")?;
    }
    if feedback != 0 {
        ctx.u8("Feedback info")?;
    }
    Ok(())
}

/// One-byte short IE
pub fn radio_device_status(ctx: &mut ElementContext<'_, '_>) -> Result<(), DecodeError> {
    ctx.reserved(0, 2)?;
    ctx.named_bits("Status flag", 2, 2, status_flag_name)?;
    ctx.named_bits("Duration", 4, 4, duration_name)?;
    ctx.advance(1)
}
