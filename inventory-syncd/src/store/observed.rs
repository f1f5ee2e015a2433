//! Decoding of agent discovery payloads into fresh local records.
//!
//! The agent reports each table as `{"<table>": [item, ...], "config": {...}}`.
//! Items keep the agent's own field names; a few aliases are accepted so that
//! hand-written payloads (`name`, `status`, `serial`) decode as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shared::protocol::{
    PAYLOAD_CONFIG, PAYLOAD_DEVICE, PAYLOAD_INTERFACES, PAYLOAD_INVENTORY, PAYLOAD_VLAN,
};
use shared::types::{
    Device, EntityKind, Interface, InventoryItem, IpAddress, IpVersion, Vlan, UNSYNCED,
};
use crate::error::{SyncError, SyncResult};

/// The table-specific part of one observed payload.
#[derive(Debug)]
pub struct ObservedBatch<'a> {
    pub kind: EntityKind,
    pub items: &'a [Value],
    pub config: Value,
}

/// Locate the table key and the optional batch config in a policy payload.
pub fn split(payload: &Value) -> SyncResult<ObservedBatch<'_>> {
    let object = payload.as_object().ok_or_else(|| SyncError::Parse {
        kind: "payload",
        message: "expected a JSON object".to_string(),
    })?;

    let config = object.get(PAYLOAD_CONFIG).cloned().unwrap_or(Value::Null);

    let tables = [
        (PAYLOAD_DEVICE, EntityKind::Device),
        (PAYLOAD_INTERFACES, EntityKind::Interface),
        (PAYLOAD_VLAN, EntityKind::Vlan),
        (PAYLOAD_INVENTORY, EntityKind::Inventory),
    ];

    for (key, kind) in tables {
        if let Some(items) = object.get(key) {
            let items = items.as_array().ok_or_else(|| SyncError::Parse {
                kind: kind.as_str(),
                message: format!("'{}' is not an array", key),
            })?;
            return Ok(ObservedBatch { kind, items, config });
        }
    }

    Err(SyncError::Parse {
        kind: "payload",
        message: "no device, interfaces, vlan or inventory table".to_string(),
    })
}

/// Null and missing values both decode to the type's default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct ObservedDevice {
    #[serde(alias = "name")]
    hostname: String,
    #[serde(default, deserialize_with = "lenient")]
    namespace: String,
    #[serde(default, deserialize_with = "lenient", rename = "serialNumber", alias = "serial")]
    serial_number: String,
    #[serde(default, deserialize_with = "lenient")]
    address: String,
    #[serde(default, deserialize_with = "lenient")]
    model: String,
    #[serde(default, deserialize_with = "lenient", rename = "status", alias = "state")]
    state: String,
    #[serde(default, deserialize_with = "lenient")]
    vendor: String,
    #[serde(default, deserialize_with = "lenient")]
    os: String,
}

#[derive(Debug, Deserialize)]
struct ObservedInterface {
    hostname: String,
    #[serde(default, deserialize_with = "lenient")]
    namespace: String,
    #[serde(rename = "ifname", alias = "name")]
    name: String,
    #[serde(default, deserialize_with = "lenient", rename = "adminState")]
    admin_state: String,
    #[serde(default, deserialize_with = "lenient")]
    mtu: i64,
    #[serde(default, deserialize_with = "lenient")]
    speed: i64,
    #[serde(default, deserialize_with = "lenient", rename = "macaddr", alias = "macAddress")]
    mac_address: String,
    #[serde(default, deserialize_with = "lenient", rename = "type")]
    if_type: String,
    #[serde(default, deserialize_with = "lenient", rename = "ipAddressList")]
    ip_address_list: Vec<String>,
    #[serde(default, deserialize_with = "lenient", rename = "ip6AddressList")]
    ip6_address_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ObservedVlan {
    hostname: String,
    #[serde(default, deserialize_with = "lenient")]
    namespace: String,
    #[serde(rename = "vlanName", alias = "name")]
    name: String,
    #[serde(default, deserialize_with = "lenient", rename = "vlan", alias = "vid")]
    vid: i64,
    #[serde(default, deserialize_with = "lenient")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct ObservedInventory {
    hostname: String,
    #[serde(default, deserialize_with = "lenient")]
    namespace: String,
    name: String,
    #[serde(default, deserialize_with = "lenient")]
    vendor: String,
    #[serde(default, deserialize_with = "lenient")]
    serial: String,
    #[serde(default, deserialize_with = "lenient", rename = "partNum", alias = "partNumber")]
    part_number: String,
    #[serde(default, deserialize_with = "lenient")]
    description: String,
    #[serde(default, deserialize_with = "lenient", rename = "type")]
    item_type: String,
}

fn decode<T: for<'de> Deserialize<'de>>(kind: EntityKind, item: &Value) -> SyncResult<(T, String)> {
    let observed = T::deserialize(item).map_err(|e| SyncError::Parse {
        kind: kind.as_str(),
        message: e.to_string(),
    })?;
    let blob = serde_json::to_string(item).map_err(|e| SyncError::Parse {
        kind: kind.as_str(),
        message: e.to_string(),
    })?;
    Ok((observed, blob))
}

fn require(kind: EntityKind, field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::Parse {
            kind: kind.as_str(),
            message: format!("empty {}", field),
        });
    }
    Ok(())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn device(policy: &str, config: &Value, item: &Value, now: DateTime<Utc>) -> SyncResult<Device> {
    let (o, blob) = decode::<ObservedDevice>(EntityKind::Device, item)?;
    require(EntityKind::Device, "hostname", &o.hostname)?;

    Ok(Device {
        id: new_id(),
        policy: policy.to_string(),
        namespace: o.namespace,
        hostname: o.hostname,
        serial_number: o.serial_number,
        address: o.address,
        model: o.model,
        state: o.state,
        vendor: o.vendor,
        os: o.os,
        config: config.clone(),
        blob,
        remote_id: UNSYNCED,
        first_seen: now,
        last_seen: now,
    })
}

pub fn interface(policy: &str, config: &Value, item: &Value, now: DateTime<Utc>) -> SyncResult<Interface> {
    let (o, blob) = decode::<ObservedInterface>(EntityKind::Interface, item)?;
    require(EntityKind::Interface, "hostname", &o.hostname)?;
    require(EntityKind::Interface, "ifname", &o.name)?;

    let ip_addresses = tag_addresses(&o.ip_address_list, IpVersion::V4)
        .chain(tag_addresses(&o.ip6_address_list, IpVersion::V6))
        .collect();

    Ok(Interface {
        id: new_id(),
        policy: policy.to_string(),
        namespace: o.namespace,
        hostname: o.hostname,
        name: o.name,
        admin_state: o.admin_state,
        mtu: o.mtu,
        speed: o.speed,
        mac_address: o.mac_address,
        if_type: o.if_type,
        ip_addresses,
        config: config.clone(),
        blob,
        remote_id: UNSYNCED,
        first_seen: now,
        last_seen: now,
    })
}

fn tag_addresses(list: &[String], version: IpVersion) -> impl Iterator<Item = IpAddress> + '_ {
    list.iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(move |a| IpAddress { address: a.to_string(), version })
}

pub fn vlan(policy: &str, config: &Value, item: &Value, now: DateTime<Utc>) -> SyncResult<Vlan> {
    let (o, blob) = decode::<ObservedVlan>(EntityKind::Vlan, item)?;
    require(EntityKind::Vlan, "hostname", &o.hostname)?;
    require(EntityKind::Vlan, "vlanName", &o.name)?;

    Ok(Vlan {
        id: new_id(),
        policy: policy.to_string(),
        namespace: o.namespace,
        hostname: o.hostname,
        name: o.name,
        vid: o.vid,
        state: o.state,
        config: config.clone(),
        blob,
        remote_id: UNSYNCED,
        first_seen: now,
        last_seen: now,
    })
}

pub fn inventory_item(
    policy: &str,
    config: &Value,
    item: &Value,
    now: DateTime<Utc>,
) -> SyncResult<InventoryItem> {
    let (o, blob) = decode::<ObservedInventory>(EntityKind::Inventory, item)?;
    require(EntityKind::Inventory, "hostname", &o.hostname)?;
    require(EntityKind::Inventory, "name", &o.name)?;

    Ok(InventoryItem {
        id: new_id(),
        policy: policy.to_string(),
        namespace: o.namespace,
        hostname: o.hostname,
        name: o.name,
        vendor: o.vendor,
        serial: o.serial,
        part_number: o.part_number,
        description: o.description,
        item_type: o.item_type,
        config: config.clone(),
        blob,
        remote_id: UNSYNCED,
        first_seen: now,
        last_seen: now,
    })
}
