//! Built-in element decoders
//!
//! Each submodule decodes one family of MAC IEs and messages:
//! - `dlc`: higher-layer signalling and user plane flows carrying DLC PDUs
//! - `beacon`: network and cluster beacon messages
//! - `allocation`: resource allocation and random access resource IEs
//! - `control`: padding, security, routing, release and short IEs

pub mod allocation;
pub mod beacon;
pub mod control;
pub mod dlc;

use super::mux::CodeSpace;
use super::registry::ElementRegistry;

/// Long-form (6-bit) type codes
pub mod codes {
    pub const PADDING: u8 = 0;
    pub const HL_SIGNALLING_FLOW_1: u8 = 1;
    pub const HL_SIGNALLING_FLOW_2: u8 = 2;
    pub const USER_PLANE_FLOW_1: u8 = 3;
    pub const USER_PLANE_FLOW_2: u8 = 4;
    pub const USER_PLANE_FLOW_3: u8 = 5;
    pub const USER_PLANE_FLOW_4: u8 = 6;
    pub const NETWORK_BEACON: u8 = 8;
    pub const CLUSTER_BEACON: u8 = 9;
    pub const ASSOCIATION_RELEASE: u8 = 12;
    pub const MAC_SECURITY_INFO: u8 = 16;
    pub const ROUTE_INFO: u8 = 17;
    pub const RESOURCE_ALLOCATION: u8 = 18;
    pub const RANDOM_ACCESS_RESOURCE: u8 = 19;
    pub const BROADCAST_INDICATION: u8 = 22;
}

/// Short-form (5-bit) type codes
pub mod short_codes {
    pub const PADDING: u8 = 0;
    /// Zero-byte payload
    pub const CONFIGURATION_REQUEST: u8 = 1;
    /// Zero-byte payload
    pub const KEEP_ALIVE: u8 = 2;
    /// One-byte payload
    pub const RADIO_DEVICE_STATUS: u8 = 1;
}

const DLC_FLOWS: [(u8, &str); 6] = [
    (codes::HL_SIGNALLING_FLOW_1, "Higher layer signalling - flow 1"),
    (codes::HL_SIGNALLING_FLOW_2, "Higher layer signalling - flow 2"),
    (codes::USER_PLANE_FLOW_1, "User plane data - flow 1"),
    (codes::USER_PLANE_FLOW_2, "User plane data - flow 2"),
    (codes::USER_PLANE_FLOW_3, "User plane data - flow 3"),
    (codes::USER_PLANE_FLOW_4, "User plane data - flow 4"),
];

/// Fill `registry` with every built-in decoder
pub fn register_all(registry: &mut ElementRegistry) {
    use CodeSpace::Long;

    registry.register(Long, codes::PADDING, "Padding", control::padding);
    for (code, name) in DLC_FLOWS {
        registry.register(Long, code, name, dlc::dlc_pdu);
    }
    registry.register(Long, codes::NETWORK_BEACON, "Network Beacon message", beacon::network_beacon);
    registry.register(Long, codes::CLUSTER_BEACON, "Cluster Beacon message", beacon::cluster_beacon);
    registry.register(
        Long,
        codes::ASSOCIATION_RELEASE,
        "Association Release message",
        control::association_release,
    );
    registry.register(Long, codes::MAC_SECURITY_INFO, "MAC Security Info IE", control::security_info);
    registry.register(Long, codes::ROUTE_INFO, "Route Info IE", control::route_info);
    registry.register(
        Long,
        codes::RESOURCE_ALLOCATION,
        "Resource Allocation IE",
        allocation::resource_allocation,
    );
    registry.register(
        Long,
        codes::RANDOM_ACCESS_RESOURCE,
        "Random Access Resource IE",
        allocation::random_access_resource,
    );
    registry.register(
        Long,
        codes::BROADCAST_INDICATION,
        "Broadcast Indication IE",
        control::broadcast_indication,
    );

    let empty = CodeSpace::Short { payload_len: 0 };
    registry.register_name(empty, short_codes::PADDING, "Padding");
    registry.register_name(empty, short_codes::CONFIGURATION_REQUEST, "Configuration Request IE");
    registry.register_name(empty, short_codes::KEEP_ALIVE, "Keep Alive IE");

    let one = CodeSpace::Short { payload_len: 1 };
    registry.register(one, short_codes::PADDING, "Padding", control::padding);
    registry.register(
        one,
        short_codes::RADIO_DEVICE_STATUS,
        "Radio Device Status IE",
        control::radio_device_status,
    );
}
