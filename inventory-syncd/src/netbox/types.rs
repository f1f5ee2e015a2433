//! Creation-schema representations of local records, and the response
//! envelopes of the inventory API.

use serde::{Deserialize, Serialize};

/// A taxonomy object referenced by display name only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedObject {
    pub name: String,
}

impl NamedObject {
    /// `None` for an empty name, so that unspecified references fall back
    /// to the placeholder object.
    pub fn named(name: &str) -> Option<Self> {
        let name = name.trim();
        (!name.is_empty()).then(|| Self { name: name.to_string() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTypeRef {
    pub model: String,
    pub manufacturer: Option<NamedObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRef {
    pub name: String,
    pub manufacturer: Option<NamedObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetboxDevice {
    pub name: String,
    /// Agent state, mapped to a remote status at creation time
    pub status: String,
    pub serial: String,
    pub device_type: Option<DeviceTypeRef>,
    pub platform: Option<PlatformRef>,
    pub site: Option<NamedObject>,
    pub role: Option<NamedObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetboxInterface {
    pub device_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub if_type: String,
    pub speed: i64,
    pub mtu: i64,
    pub mac_address: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetboxIpAddress {
    pub address: String,
    pub assigned_object_type: String,
    pub assigned_object_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetboxInventoryItem {
    pub device_id: i64,
    pub name: String,
    pub manufacturer: Option<NamedObject>,
    pub part_id: String,
    pub serial: String,
    pub description: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetboxVlan {
    pub vid: i64,
    pub name: String,
    pub status: String,
}

/// Nested tag reference attached to created objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub name: String,
    pub slug: String,
}

/// List endpoint envelope
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectId {
    pub id: i64,
}
