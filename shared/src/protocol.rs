/// API path prefix
pub const API_PREFIX: &str = "/v1";

/// Keys of an observed discovery payload
pub const PAYLOAD_DEVICE: &str = "device";
pub const PAYLOAD_INTERFACES: &str = "interfaces";
pub const PAYLOAD_VLAN: &str = "vlan";
pub const PAYLOAD_INVENTORY: &str = "inventory";
pub const PAYLOAD_CONFIG: &str = "config";

/// Keys read from a batch `config` block
pub const CONFIG_SITE: &str = "site";
pub const CONFIG_ROLE: &str = "role";

/// Display name of auto-created stand-in taxonomy objects
pub const UNKNOWN_NAME: &str = "Unknown";

/// Tag applied to every object created from discovery
pub const DISCOVERED_TAG_NAME: &str = "Discovered";
pub const DISCOVERED_TAG_COLOR: &str = "c0c0c0";

/// Extra tag applied to auto-created stand-in objects
pub const PLACEHOLDER_TAG_NAME: &str = "Placeholder";
pub const PLACEHOLDER_TAG_COLOR: &str = "ff6600";

pub const PLACEHOLDER_SITE_STATUS: &str = "staging";
pub const DISCOVERED_SITE_STATUS: &str = "active";

pub const INTERFACE_OBJECT_TYPE: &str = "dcim.interface";
pub const UNKNOWN_INTERFACE_TYPE: &str = "other";
pub const INTERFACE_MTU_MIN: i64 = 1;
pub const INTERFACE_SPEED_MAX: i64 = 2_147_483_647;

pub const VLAN_ID_MIN: i64 = 1;
pub const VLAN_ID_MAX: i64 = 4094;

/// Map an agent device state to an inventory device status.
pub fn device_status(state: &str) -> Option<&'static str> {
    match state {
        "alive" => Some("active"),
        "dead" => Some("offline"),
        _ => None,
    }
}

/// Map an agent interface admin state to the `enabled` flag.
pub fn interface_enabled(state: &str) -> Option<bool> {
    match state {
        "up" => Some(true),
        "down" => Some(false),
        _ => None,
    }
}

/// Map an agent VLAN state to an inventory VLAN status.
pub fn vlan_status(state: &str) -> &'static str {
    match state {
        "suspended" | "down" => "deprecated",
        _ => "active",
    }
}
