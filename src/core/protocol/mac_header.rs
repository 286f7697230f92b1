//! MAC header type and MAC common header
//!
//! ```text
//! octet 0:  version(2) | MAC security(2) | header type(4)
//! Data:          reserved(3) reset(1) SN(12)
//! Beacon:        network ID(24) transmitter(32)
//! Unicast:       reserved(3) reset(1) SN(12) receiver(32) transmitter(32)
//! RD broadcast:  reserved(3) reset(1) SN(12) transmitter(32)
//! ```

use crate::core::cursor::ByteCursor;
use crate::core::diagnostic::{DiagnosticKind, Diagnostics};
use crate::core::error::DecodeError;
use crate::core::field::{FieldTree, FieldValue};
use serde::{Deserialize, Serialize};

/// Receiver used for frames that address everyone
pub const BROADCAST_ID: u32 = 0xFFFF_FFFF;

/// MAC security field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Not used
    None,
    /// In use, security info IE in the PDU
    WithInfo,
    /// In use, no security info IE
    WithoutInfo,
    Reserved,
}

impl SecurityMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::None,
            1 => Self::WithInfo,
            2 => Self::WithoutInfo,
            _ => Self::Reserved,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "MAC security is not used",
            Self::WithInfo => "MAC security used, security IE present",
            Self::WithoutInfo => "MAC security used, no security IE",
            Self::Reserved => "Reserved",
        }
    }

    /// A MIC trailer ends the PDU
    pub fn has_mic(&self) -> bool {
        matches!(self, Self::WithInfo | Self::WithoutInfo)
    }
}

/// Decoded common header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommonHeader {
    Data {
        reset: bool,
        sequence: u16,
    },
    Beacon {
        network_id: u32,
        transmitter: u32,
    },
    Unicast {
        reset: bool,
        sequence: u16,
        receiver: u32,
        transmitter: u32,
    },
    RdBroadcast {
        reset: bool,
        sequence: u16,
        transmitter: u32,
    },
    /// Escape or reserved type; the rest of the PDU cannot be sized
    Unknown {
        header_type: u8,
    },
}

/// MAC header type octet plus common header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacHeader {
    pub version: u8,
    pub security: SecurityMode,
    pub common: CommonHeader,
    /// Bytes taken by both headers
    pub length: usize,
}

fn header_type_name(value: u64) -> &'static str {
    match value {
        0 => "DATA MAC PDU header",
        1 => "Beacon header",
        2 => "Unicast header",
        3 => "RD broadcasting header",
        15 => "Escape",
        _ => "Reserved",
    }
}

impl MacHeader {
    /// Decode both headers at the cursor, recording fields as it goes
    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        tree: &mut FieldTree,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, DecodeError> {
        let start = cursor.position();
        let version = cursor.read(2, 0)? as u8;
        let security = SecurityMode::from_bits(cursor.read(2, 2)? as u8);
        let header_type = cursor.read(4, 4)?;

        let node = tree.open("MAC header type", start);
        tree.add_uint("Version", version, start, 1);
        tree.add("MAC security", FieldValue::named(security as u8, security.name()), start, 1);
        tree.add(
            "MAC header type",
            FieldValue::named(header_type, header_type_name(header_type)),
            start,
            1,
        );
        cursor.skip(1)?;
        tree.close(node, cursor.position());

        let label = header_type_name(header_type);
        let node = tree.open(label, cursor.position());
        let common = match header_type {
            0 => {
                let (reset, sequence) = sequence_field(cursor, tree, diagnostics)?;
                CommonHeader::Data { reset, sequence }
            }
            1 => {
                let offset = cursor.position();
                let network_id = cursor.read_u24()?;
                tree.add("Network ID", FieldValue::Text(format!("0x{network_id:06x}")), offset, 3);
                let transmitter = long_id(cursor, tree, "Transmitter address")?;
                CommonHeader::Beacon {
                    network_id,
                    transmitter,
                }
            }
            2 => {
                let (reset, sequence) = sequence_field(cursor, tree, diagnostics)?;
                let receiver = long_id(cursor, tree, "Receiver address")?;
                let transmitter = long_id(cursor, tree, "Transmitter address")?;
                CommonHeader::Unicast {
                    reset,
                    sequence,
                    receiver,
                    transmitter,
                }
            }
            3 => {
                let (reset, sequence) = sequence_field(cursor, tree, diagnostics)?;
                let transmitter = long_id(cursor, tree, "Transmitter address")?;
                CommonHeader::RdBroadcast {
                    reset,
                    sequence,
                    transmitter,
                }
            }
            other => CommonHeader::Unknown {
                // four-bit field
                header_type: other as u8,
            },
        };
        tree.close(node, cursor.position());

        Ok(Self {
            version,
            security,
            common,
            length: cursor.position() - start,
        })
    }

    /// Transmitter long RD ID, when the common header carries one
    pub fn transmitter(&self) -> Option<u32> {
        match self.common {
            CommonHeader::Beacon { transmitter, .. }
            | CommonHeader::Unicast { transmitter, .. }
            | CommonHeader::RdBroadcast { transmitter, .. } => Some(transmitter),
            _ => None,
        }
    }

    /// Receiver long RD ID; beacons and RD broadcasts go to everyone
    pub fn receiver(&self) -> Option<u32> {
        match self.common {
            CommonHeader::Unicast { receiver, .. } => Some(receiver),
            CommonHeader::Beacon { .. } | CommonHeader::RdBroadcast { .. } => Some(BROADCAST_ID),
            _ => None,
        }
    }

    /// Whether the element chain after the header can be walked
    pub fn is_known(&self) -> bool {
        !matches!(self.common, CommonHeader::Unknown { .. })
    }
}

fn sequence_field(
    cursor: &mut ByteCursor<'_>,
    tree: &mut FieldTree,
    diagnostics: &mut Diagnostics,
) -> Result<(bool, u16), DecodeError> {
    let offset = cursor.position();
    let reserved = cursor.read(3, 0)?;
    let reset = cursor.read(1, 3)? == 1;
    // twelve-bit field
    let sequence = cursor.read(12, 4)? as u16;
    if reserved != 0 {
        diagnostics.report(
            DiagnosticKind::ReservedBitsNonZero,
            offset..offset + 1,
            format!("common header reserved bits hold {reserved:#x}"),
        );
    }
    tree.add_bool("Reset", reset, offset, 1);
    tree.add_uint("Sequence number", sequence, offset, 2);
    cursor.skip(2)?;
    Ok((reset, sequence))
}

fn long_id(cursor: &mut ByteCursor<'_>, tree: &mut FieldTree, label: &str) -> Result<u32, DecodeError> {
    let offset = cursor.position();
    let value = cursor.read_u32()?;
    tree.add(label, FieldValue::Text(format!("0x{value:08x}")), offset, 4);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (Result<MacHeader, DecodeError>, FieldTree, Diagnostics) {
        let mut cursor = ByteCursor::new(bytes);
        let mut tree = FieldTree::new();
        let mut diagnostics = Diagnostics::new();
        let header = MacHeader::decode(&mut cursor, &mut tree, &mut diagnostics);
        (header, tree, diagnostics)
    }

    #[test]
    fn test_data_header() {
        let (header, tree, diagnostics) = decode(&[0x00, 0x10, 0x2A]);
        let header = header.unwrap();

        assert_eq!(header.length, 3);
        assert_eq!(header.common, CommonHeader::Data { reset: true, sequence: 0x2A });
        assert_eq!(header.transmitter(), None);
        assert!(diagnostics.is_empty());
        assert_eq!(tree.find("Sequence number").unwrap().value, FieldValue::Unsigned(42));
    }

    #[test]
    fn test_beacon_header() {
        let (header, tree, _) = decode(&[0x01, 0xAB, 0xCD, 0xEF, 0x11, 0x22, 0x33, 0x44]);
        let header = header.unwrap();

        assert_eq!(header.length, 8);
        assert_eq!(header.transmitter(), Some(0x1122_3344));
        assert_eq!(header.receiver(), Some(BROADCAST_ID));
        assert_eq!(tree.find("Network ID").unwrap().value, FieldValue::Text("0xabcdef".into()));
    }

    #[test]
    fn test_unicast_header_with_security() {
        let bytes = [0x12, 0x00, 0x07, 0, 0, 0, 2, 0, 0, 0, 1];
        let (header, _, _) = decode(&bytes);
        let header = header.unwrap();

        assert_eq!(header.security, SecurityMode::WithInfo);
        assert!(header.security.has_mic());
        assert_eq!(header.receiver(), Some(2));
        assert_eq!(header.transmitter(), Some(1));
        assert_eq!(header.length, 11);
    }

    #[test]
    fn test_reserved_bits_in_common_header() {
        let (header, _, diagnostics) = decode(&[0x03, 0xE0, 0x01, 0, 0, 0, 9]);
        assert!(header.is_ok());
        assert_eq!(diagnostics.count(DiagnosticKind::ReservedBitsNonZero), 1);
    }

    #[test]
    fn test_escape_header_type() {
        let (header, _, _) = decode(&[0x0F, 0xAA]);
        let header = header.unwrap();
        assert!(!header.is_known());
        assert_eq!(header.length, 1);
    }

    #[test]
    fn test_truncated_common_header() {
        let (header, _, _) = decode(&[0x02, 0x00, 0x01, 0xAA]);
        assert!(header.unwrap_err().is_truncation());
    }
}
