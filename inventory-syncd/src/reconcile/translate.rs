//! Mapping of local records onto the inventory creation schema.

use serde_json::Value;
use shared::protocol::{vlan_status, CONFIG_ROLE, CONFIG_SITE, INTERFACE_OBJECT_TYPE, VLAN_ID_MAX, VLAN_ID_MIN};
use shared::types::{Device, Interface, InventoryItem, InventoryRecord, IpAddress, IpVersion, Vlan};
use crate::error::{SyncError, SyncResult};
use crate::netbox::types::{
    DeviceTypeRef, NamedObject, NetboxDevice, NetboxInterface, NetboxInventoryItem,
    NetboxIpAddress, NetboxVlan, PlatformRef,
};

fn config_name(config: &Value, key: &str) -> Option<NamedObject> {
    config.get(key).and_then(Value::as_str).and_then(NamedObject::named)
}

/// The batch config may name the site and role the device belongs to.
/// The vendor becomes the manufacturer of both the device type and the platform.
pub fn device(device: &Device) -> NetboxDevice {
    let manufacturer = NamedObject::named(&device.vendor);

    let device_type = NamedObject::named(&device.model).map(|m| DeviceTypeRef {
        model: m.name,
        manufacturer: manufacturer.clone(),
    });
    let platform = NamedObject::named(&device.os).map(|p| PlatformRef {
        name: p.name,
        manufacturer,
    });

    NetboxDevice {
        name: device.hostname.clone(),
        status: device.state.clone(),
        serial: device.serial_number.clone(),
        device_type,
        platform,
        site: config_name(&device.config, CONFIG_SITE),
        role: config_name(&device.config, CONFIG_ROLE),
    }
}

pub fn interface(ifce: &Interface, device_id: i64) -> NetboxInterface {
    NetboxInterface {
        device_id,
        name: ifce.name.clone(),
        if_type: ifce.if_type.clone(),
        speed: ifce.speed,
        mtu: ifce.mtu,
        mac_address: ifce.mac_address.clone(),
        state: ifce.admin_state.clone(),
    }
}

/// Addresses of an interface, each bound to the remote interface object.
pub fn ip_addresses(ifce: &Interface, interface_id: i64) -> Vec<NetboxIpAddress> {
    ifce.ip_addresses
        .iter()
        .map(|ip| NetboxIpAddress {
            address: normalize_address(ip),
            assigned_object_type: INTERFACE_OBJECT_TYPE.to_string(),
            assigned_object_id: interface_id,
        })
        .collect()
}

/// Host addresses without a prefix length get a full-length one.
pub fn normalize_address(ip: &IpAddress) -> String {
    let address = ip.address.trim();
    if address.contains('/') {
        return address.to_string();
    }
    match ip.version {
        IpVersion::V4 => format!("{}/32", address),
        IpVersion::V6 => format!("{}/128", address),
    }
}

pub fn inventory_item(item: &InventoryItem, device_id: i64) -> NetboxInventoryItem {
    NetboxInventoryItem {
        device_id,
        name: item.name.clone(),
        manufacturer: NamedObject::named(&item.vendor),
        part_id: item.part_number.clone(),
        serial: item.serial.clone(),
        description: item.description.clone(),
        label: item.item_type.clone(),
    }
}

pub fn vlan(vlan: &Vlan) -> SyncResult<NetboxVlan> {
    if !(VLAN_ID_MIN..=VLAN_ID_MAX).contains(&vlan.vid) {
        return Err(SyncError::Translation {
            kind: Vlan::KIND,
            key: vlan.natural_key(),
            message: format!("vid {} outside {}..={}", vlan.vid, VLAN_ID_MIN, VLAN_ID_MAX),
        });
    }

    Ok(NetboxVlan {
        vid: vlan.vid,
        name: vlan.name.clone(),
        status: vlan_status(&vlan.state).to_string(),
    })
}
