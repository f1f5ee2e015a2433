//! Pushes stored records to the inventory system and writes the remote ids
//! back.
//!
//! A batch is drained through a work queue. Syncing a device appends its
//! still-unsynced interfaces and inventory items to the same queue, so
//! children deferred earlier resolve once their parent has an id. Failures
//! are collected per record and never stop the rest of the batch.

pub mod diff;
pub mod primary_ip;
pub mod translate;

use std::collections::VecDeque;
use std::net::IpAddr;
use serde::Serialize;
use shared::types::{
    Device, EntityKind, Interface, InventoryItem, InventoryRecord, NaturalKey, RecordBatch, Vlan,
};
use crate::error::{BatchErrors, SyncError, SyncResult};
use crate::netbox::client::NetboxClient;
use crate::store_manager::StoreHandle;
use self::diff::{DiffReport, Named};

enum WorkItem {
    Device(Device),
    Interface(Interface),
    Vlan(Vlan),
    Inventory(InventoryItem),
}

impl WorkItem {
    fn kind(&self) -> EntityKind {
        match self {
            WorkItem::Device(_) => Device::KIND,
            WorkItem::Interface(_) => Interface::KIND,
            WorkItem::Vlan(_) => Vlan::KIND,
            WorkItem::Inventory(_) => InventoryItem::KIND,
        }
    }

    fn id(&self) -> &str {
        match self {
            WorkItem::Device(r) => r.id(),
            WorkItem::Interface(r) => r.id(),
            WorkItem::Vlan(r) => r.id(),
            WorkItem::Inventory(r) => r.id(),
        }
    }

    fn natural_key(&self) -> NaturalKey {
        match self {
            WorkItem::Device(r) => r.natural_key(),
            WorkItem::Interface(r) => r.natural_key(),
            WorkItem::Vlan(r) => r.natural_key(),
            WorkItem::Inventory(r) => r.natural_key(),
        }
    }
}

fn queue_of(batch: RecordBatch) -> VecDeque<WorkItem> {
    match batch {
        RecordBatch::Devices(v) => v.into_iter().map(WorkItem::Device).collect(),
        RecordBatch::Interfaces(v) => v.into_iter().map(WorkItem::Interface).collect(),
        RecordBatch::Vlans(v) => v.into_iter().map(WorkItem::Vlan).collect(),
        RecordBatch::Inventory(v) => v.into_iter().map(WorkItem::Inventory).collect(),
    }
}

/// Per-batch state shared by the records of one reconcile call
#[derive(Default)]
struct Pass {
    queue: VecDeque<WorkItem>,
    /// (device remote id, address) pairs applied once the queue is drained
    primaries: Vec<(i64, IpAddr)>,
    errors: BatchErrors,
}

pub struct Reconciler {
    store: StoreHandle,
    netbox: NetboxClient,
}

impl Reconciler {
    pub fn new(store: StoreHandle, netbox: NetboxClient) -> Self {
        Self { store, netbox }
    }

    /// Sync every record of a homogeneous batch in storage order.
    pub async fn reconcile(&mut self, batch: RecordBatch) -> Result<(), BatchErrors> {
        let mut pass = Pass { queue: queue_of(batch), ..Default::default() };

        while let Some(item) = pass.queue.pop_front() {
            if item.id().is_empty() {
                tracing::debug!(kind = %item.kind(), "Skipping record without local id");
                continue;
            }

            let kind = item.kind();
            let key = item.natural_key();
            match self.sync(item, &mut pass).await {
                Ok(()) => {}
                Err(SyncError::Cancelled) => {
                    pass.errors.push(SyncError::Cancelled);
                    return pass.errors.into_result();
                }
                Err(e) => {
                    tracing::warn!(kind = %kind, key = %key, error = %e, "Reconciliation failed");
                    pass.errors.push(e);
                }
            }
        }

        for (device_id, address) in std::mem::take(&mut pass.primaries) {
            match self.netbox.assign_primary_ip(device_id, address).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(remote_id = device_id, address = %address, "Primary IP not present remotely");
                }
                Err(e) => {
                    tracing::warn!(remote_id = device_id, address = %address, error = %e, "Primary IP assignment failed");
                    pass.errors.push(e);
                }
            }
        }

        pass.errors.into_result()
    }

    async fn sync(&mut self, item: WorkItem, pass: &mut Pass) -> SyncResult<()> {
        match item {
            WorkItem::Device(d) => self.sync_device(d, pass).await,
            WorkItem::Interface(i) => self.sync_interface(i, pass).await,
            WorkItem::Vlan(v) => self.sync_vlan(v).await,
            WorkItem::Inventory(i) => self.sync_inventory_item(i).await,
        }
    }

    async fn sync_device(&mut self, device: Device, pass: &mut Pass) -> SyncResult<()> {
        let observed = translate::device(&device);

        if let Ok(others) = self.store.get_devices_by_name(device.hostname.clone()).await {
            let known = others
                .iter()
                .filter(|o| o.id != device.id)
                .map(|o| (o.natural_key(), translate::device(o)));
            report_drift(Device::KIND, &device.natural_key(), &observed, known);
        }

        let remote_id = self.netbox.create_device(&observed).await?;
        let device = self.store.update_device_remote_id(device.id.clone(), remote_id).await?;
        tracing::info!(
            policy = %device.policy,
            hostname = %device.hostname,
            remote_id,
            "Device synced"
        );

        let (policy, namespace, hostname) =
            (device.policy.clone(), device.namespace.clone(), device.hostname.clone());
        let interfaces = self
            .store
            .get_interfaces(policy.clone(), namespace.clone(), hostname.clone())
            .await?;
        let items = self.store.get_inventory(policy, namespace, hostname).await?;

        let before = pass.queue.len();
        pass.queue.extend(
            interfaces
                .iter()
                .filter(|i| !i.is_synced())
                .cloned()
                .map(WorkItem::Interface),
        );
        pass.queue.extend(
            items
                .into_iter()
                .filter(|i| !i.is_synced())
                .map(WorkItem::Inventory),
        );
        if pass.queue.len() > before {
            tracing::debug!(
                hostname = %device.hostname,
                queued = pass.queue.len() - before,
                "Queued deferred children"
            );
        }

        let candidates = primary_ip::resolve_address(&device.address).await;
        match primary_ip::pick_primary(&candidates, &interfaces) {
            Some(primary) if primary.on_interface => {
                pass.primaries.push((remote_id, primary.address));
            }
            Some(primary) => {
                tracing::debug!(
                    hostname = %device.hostname,
                    address = %primary.address,
                    "Resolved address is not on any interface, keeping it"
                );
            }
            None => {}
        }

        Ok(())
    }

    /// The owning device, which must already carry a remote id.
    async fn parent_device(&self, kind: EntityKind, key: NaturalKey) -> SyncResult<Device> {
        let device_key = NaturalKey { name: None, ..key.clone() };
        let unresolved = || SyncError::UnresolvedDependency {
            kind,
            key: key.clone(),
            device: device_key.clone(),
        };

        let device = match self
            .store
            .get_device(key.policy.clone(), key.namespace.clone(), key.hostname.clone())
            .await
        {
            Ok(device) => device,
            Err(SyncError::NotFound { .. }) => return Err(unresolved()),
            Err(e) => return Err(e),
        };

        if !device.is_synced() {
            return Err(unresolved());
        }
        Ok(device)
    }

    /// Each address is its own leaf: a failed address is recorded in the pass
    /// and the remaining ones are still created.
    async fn sync_interface(&mut self, ifce: Interface, pass: &mut Pass) -> SyncResult<()> {
        let device = self.parent_device(Interface::KIND, ifce.natural_key()).await?;
        let key = ifce.natural_key();

        let observed = translate::interface(&ifce, device.remote_id);

        // Interfaces on other devices are compared on their own attributes only.
        if let Ok(others) = self.store.get_interfaces_by_name(ifce.name.clone()).await {
            let known = others
                .iter()
                .filter(|o| o.id != ifce.id)
                .map(|o| (o.natural_key(), translate::interface(o, device.remote_id)));
            report_drift(Interface::KIND, &key, &observed, known);
        }

        let remote_id = self.netbox.create_interface(&observed).await?;
        let ifce = self.store.update_interface_remote_id(ifce.id.clone(), remote_id).await?;
        tracing::info!(
            hostname = %ifce.hostname,
            interface = %ifce.name,
            remote_id,
            "Interface synced"
        );

        for ip in translate::ip_addresses(&ifce, remote_id) {
            match self.netbox.create_interface_ip_address(&ip).await {
                Ok(_) => {}
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    tracing::warn!(key = %key, address = %ip.address, error = %e, "IP address creation failed");
                    pass.errors.push(e);
                }
            }
        }

        Ok(())
    }

    async fn sync_inventory_item(&mut self, item: InventoryItem) -> SyncResult<()> {
        let device = self.parent_device(InventoryItem::KIND, item.natural_key()).await?;

        let observed = translate::inventory_item(&item, device.remote_id);

        if let Ok(others) = self.store.get_inventory_by_name(item.name.clone()).await {
            let known = others
                .iter()
                .filter(|o| o.id != item.id)
                .map(|o| (o.natural_key(), translate::inventory_item(o, device.remote_id)));
            report_drift(InventoryItem::KIND, &item.natural_key(), &observed, known);
        }

        let remote_id = self.netbox.create_inventory_item(&observed).await?;
        let item = self.store.update_inventory_remote_id(item.id.clone(), remote_id).await?;
        tracing::info!(hostname = %item.hostname, item = %item.name, remote_id, "Inventory item synced");

        Ok(())
    }

    async fn sync_vlan(&mut self, vlan: Vlan) -> SyncResult<()> {
        let observed = translate::vlan(&vlan)?;

        if let Ok(others) = self.store.get_vlans_by_name(vlan.name.clone()).await {
            let known = others
                .iter()
                .filter(|o| o.id != vlan.id)
                .filter_map(|o| translate::vlan(o).ok().map(|t| (o.natural_key(), t)));
            report_drift(Vlan::KIND, &vlan.natural_key(), &observed, known);
        }

        let remote_id = self.netbox.create_vlan(&observed).await?;
        let vlan = self.store.update_vlan_remote_id(vlan.id.clone(), remote_id).await?;
        tracing::info!(hostname = %vlan.hostname, vlan = %vlan.name, remote_id, "VLAN synced");

        Ok(())
    }
}

fn report_drift<T>(
    kind: EntityKind,
    key: &NaturalKey,
    observed: &T,
    known: impl IntoIterator<Item = (NaturalKey, T)>,
) where
    T: Named + Serialize + Default + PartialEq,
{
    for (other, translated) in known {
        match diff::diff(observed, &translated) {
            None => {}
            Some(DiffReport::Changed(fields)) if !fields.is_empty() => {
                let report = DiffReport::Changed(fields);
                tracing::info!(kind = %kind, key = %key, other = %other, drift = %report, "Observed drift");
            }
            Some(report) => {
                tracing::debug!(kind = %kind, key = %key, other = %other, report = %report, "Compared");
            }
        }
    }
}
