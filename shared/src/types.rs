use std::fmt;
use std::net::IpAddr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;

/// Remote id carried by a record that has been observed but not yet pushed
/// to the inventory system. A record that leaves this value never returns to it.
pub const UNSYNCED: i64 = -1;

/// Entity kinds tracked by the local catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Device,
    Interface,
    Vlan,
    Inventory,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Device => "device",
            EntityKind::Interface => "interface",
            EntityKind::Vlan => "vlan",
            EntityKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (policy, namespace, hostname[, name]) tuple identifying an entity
/// independently of its generated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NaturalKey {
    pub policy: String,
    pub namespace: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.policy, self.namespace, self.hostname)?;
        if let Some(name) = &self.name {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

/// An address observed on an interface, in the agent's `addr/prefixlen` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
    pub version: IpVersion,
}

impl IpAddress {
    /// The address without its prefix length, if it is a valid IP literal.
    pub fn host(&self) -> Option<IpAddr> {
        self.address.split('/').next()?.trim().parse().ok()
    }
}

/// A discovered network device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Locally generated identifier (UUID v4)
    pub id: String,
    pub policy: String,
    pub namespace: String,
    pub hostname: String,
    pub serial_number: String,
    /// Management address as reported by the agent, possibly `host:port`
    pub address: String,
    pub model: String,
    pub state: String,
    pub vendor: String,
    pub os: String,
    /// Operator hints attached to the discovery batch
    pub config: Value,
    /// Verbatim observed JSON
    pub blob: String,
    pub remote_id: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A discovered interface. The owning device is resolved through the
/// device natural key (policy, namespace, hostname) at sync time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub id: String,
    pub policy: String,
    pub namespace: String,
    pub hostname: String,
    pub name: String,
    pub admin_state: String,
    pub mtu: i64,
    pub speed: i64,
    pub mac_address: String,
    pub if_type: String,
    pub ip_addresses: Vec<IpAddress>,
    pub config: Value,
    pub blob: String,
    pub remote_id: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: String,
    pub policy: String,
    pub namespace: String,
    pub hostname: String,
    pub name: String,
    /// 802.1Q VLAN id, 0 when the agent did not report one
    pub vid: i64,
    pub state: String,
    pub config: Value,
    pub blob: String,
    pub remote_id: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A hardware component (linecard, PSU, optic...) of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub policy: String,
    pub namespace: String,
    pub hostname: String,
    pub name: String,
    pub vendor: String,
    pub serial: String,
    pub part_number: String,
    pub description: String,
    pub item_type: String,
    pub config: Value,
    pub blob: String,
    pub remote_id: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Behaviour shared by every stored record kind.
pub trait InventoryRecord {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn remote_id(&self) -> i64;
    fn natural_key(&self) -> NaturalKey;

    fn is_synced(&self) -> bool {
        self.remote_id() != UNSYNCED
    }
}

impl InventoryRecord for Device {
    const KIND: EntityKind = EntityKind::Device;

    fn id(&self) -> &str {
        &self.id
    }

    fn remote_id(&self) -> i64 {
        self.remote_id
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            policy: self.policy.clone(),
            namespace: self.namespace.clone(),
            hostname: self.hostname.clone(),
            name: None,
        }
    }
}

impl InventoryRecord for Interface {
    const KIND: EntityKind = EntityKind::Interface;

    fn id(&self) -> &str {
        &self.id
    }

    fn remote_id(&self) -> i64 {
        self.remote_id
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            policy: self.policy.clone(),
            namespace: self.namespace.clone(),
            hostname: self.hostname.clone(),
            name: Some(self.name.clone()),
        }
    }
}

impl InventoryRecord for Vlan {
    const KIND: EntityKind = EntityKind::Vlan;

    fn id(&self) -> &str {
        &self.id
    }

    fn remote_id(&self) -> i64 {
        self.remote_id
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            policy: self.policy.clone(),
            namespace: self.namespace.clone(),
            hostname: self.hostname.clone(),
            name: Some(self.name.clone()),
        }
    }
}

impl InventoryRecord for InventoryItem {
    const KIND: EntityKind = EntityKind::Inventory;

    fn id(&self) -> &str {
        &self.id
    }

    fn remote_id(&self) -> i64 {
        self.remote_id
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            policy: self.policy.clone(),
            namespace: self.namespace.clone(),
            hostname: self.hostname.clone(),
            name: Some(self.name.clone()),
        }
    }
}

/// A homogeneous batch of records, as returned by one `save` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum RecordBatch {
    Devices(Vec<Device>),
    Interfaces(Vec<Interface>),
    Vlans(Vec<Vlan>),
    Inventory(Vec<InventoryItem>),
}

impl RecordBatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordBatch::Devices(_) => EntityKind::Device,
            RecordBatch::Interfaces(_) => EntityKind::Interface,
            RecordBatch::Vlans(_) => EntityKind::Vlan,
            RecordBatch::Inventory(_) => EntityKind::Inventory,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Devices(v) => v.len(),
            RecordBatch::Interfaces(v) => v.len(),
            RecordBatch::Vlans(v) => v.len(),
            RecordBatch::Inventory(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_host_strips_prefix() {
        let ip = IpAddress { address: "10.0.0.1/24".to_string(), version: IpVersion::V4 };
        assert_eq!(ip.host(), Some("10.0.0.1".parse().unwrap()));

        let ip6 = IpAddress { address: "fd00::1/64".to_string(), version: IpVersion::V6 };
        assert_eq!(ip6.host(), Some("fd00::1".parse().unwrap()));

        let bad = IpAddress { address: "not-an-ip".to_string(), version: IpVersion::V4 };
        assert_eq!(bad.host(), None);
    }

    #[test]
    fn test_natural_key_display() {
        let key = NaturalKey {
            policy: "pol1".to_string(),
            namespace: "dc1".to_string(),
            hostname: "sw1".to_string(),
            name: Some("eth0".to_string()),
        };
        assert_eq!(key.to_string(), "pol1/dc1/sw1/eth0");
    }
}
