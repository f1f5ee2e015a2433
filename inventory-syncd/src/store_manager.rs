use std::thread;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use shared::types::{Device, Interface, InventoryItem, Vlan};
use crate::error::{SyncError, SyncResult};
use crate::store::db::{InventoryDb, PendingCounts, Saved};

type StoreJob = Box<dyn FnOnce(&InventoryDb) + Send>;

/// Commands sent to the store thread
pub enum StoreCommand {
    Save {
        policy: String,
        payload: Value,
        reply: oneshot::Sender<SyncResult<Saved>>,
    },
    /// Any other read or remote-id update, run against the connection in order
    Run(StoreJob),
    Shutdown,
}

/// Handle to the thread owning the SQLite connection. Commands are executed
/// one at a time in the order they were sent.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Spawn a new store thread with the given database
    pub fn spawn(db: InventoryDb) -> Self {
        let (tx, mut rx) = mpsc::channel::<StoreCommand>(256);

        // The connection lives on this thread; callers only hold the sender
        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    StoreCommand::Save { policy, payload, reply } => {
                        let result = db.save(&policy, &payload);
                        if let Ok(saved) = &result {
                            tracing::debug!(
                                policy = %policy,
                                kind = %saved.records.kind(),
                                stored = saved.records.len(),
                                failed = saved.errors.len(),
                                "Saved observed batch"
                            );
                        }
                        // Caller may have given up waiting
                        let _ = reply.send(result);
                    }
                    // Queries and remote-id updates reply from inside the job
                    StoreCommand::Run(job) => job(&db),
                    StoreCommand::Shutdown => {
                        tracing::info!("Store thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    async fn run<T, F>(&self, f: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&InventoryDb) -> SyncResult<T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: StoreJob = Box::new(move |db| {
            let _ = reply.send(f(db));
        });
        self.tx
            .send(StoreCommand::Run(job))
            .await
            .map_err(|_| SyncError::StoreClosed)?;
        rx.await.map_err(|_| SyncError::StoreClosed)?
    }

    /// Upsert an observed policy payload. See `InventoryDb::save`.
    pub async fn save(&self, policy: String, payload: Value) -> SyncResult<Saved> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Save { policy, payload, reply })
            .await
            .map_err(|_| SyncError::StoreClosed)?;
        rx.await.map_err(|_| SyncError::StoreClosed)?
    }

    pub async fn update_device_remote_id(&self, id: String, remote_id: i64) -> SyncResult<Device> {
        self.run(move |db| db.update_device_remote_id(&id, remote_id)).await
    }

    pub async fn update_interface_remote_id(&self, id: String, remote_id: i64) -> SyncResult<Interface> {
        self.run(move |db| db.update_interface_remote_id(&id, remote_id)).await
    }

    pub async fn update_vlan_remote_id(&self, id: String, remote_id: i64) -> SyncResult<Vlan> {
        self.run(move |db| db.update_vlan_remote_id(&id, remote_id)).await
    }

    pub async fn update_inventory_remote_id(&self, id: String, remote_id: i64) -> SyncResult<InventoryItem> {
        self.run(move |db| db.update_inventory_remote_id(&id, remote_id)).await
    }

    pub async fn get_device(&self, policy: String, namespace: String, hostname: String) -> SyncResult<Device> {
        self.run(move |db| db.get_device_by_policy_namespace_hostname(&policy, &namespace, &hostname))
            .await
    }

    pub async fn get_devices_by_name(&self, hostname: String) -> SyncResult<Vec<Device>> {
        self.run(move |db| db.get_devices_by_name(&hostname)).await
    }

    pub async fn get_devices(&self, policy: String, namespace: String) -> SyncResult<Vec<Device>> {
        self.run(move |db| db.get_devices_by_policy_and_namespace(&policy, &namespace))
            .await
    }

    pub async fn get_interfaces(
        &self,
        policy: String,
        namespace: String,
        hostname: String,
    ) -> SyncResult<Vec<Interface>> {
        self.run(move |db| db.get_interfaces_by_policy_namespace_hostname(&policy, &namespace, &hostname))
            .await
    }

    pub async fn get_interfaces_by_name(&self, name: String) -> SyncResult<Vec<Interface>> {
        self.run(move |db| db.get_interfaces_by_name(&name)).await
    }

    pub async fn get_interfaces_in_namespace(&self, policy: String, namespace: String) -> SyncResult<Vec<Interface>> {
        self.run(move |db| db.get_interfaces_by_policy_and_namespace(&policy, &namespace))
            .await
    }

    pub async fn get_vlans(&self, policy: String, namespace: String, hostname: String) -> SyncResult<Vec<Vlan>> {
        self.run(move |db| db.get_vlans_by_policy_namespace_hostname(&policy, &namespace, &hostname))
            .await
    }

    pub async fn get_vlans_by_name(&self, name: String) -> SyncResult<Vec<Vlan>> {
        self.run(move |db| db.get_vlans_by_name(&name)).await
    }

    pub async fn get_vlans_in_namespace(&self, policy: String, namespace: String) -> SyncResult<Vec<Vlan>> {
        self.run(move |db| db.get_vlans_by_policy_and_namespace(&policy, &namespace))
            .await
    }

    pub async fn get_inventory(
        &self,
        policy: String,
        namespace: String,
        hostname: String,
    ) -> SyncResult<Vec<InventoryItem>> {
        self.run(move |db| db.get_inventory_by_policy_namespace_hostname(&policy, &namespace, &hostname))
            .await
    }

    pub async fn get_inventory_by_name(&self, name: String) -> SyncResult<Vec<InventoryItem>> {
        self.run(move |db| db.get_inventory_by_name(&name)).await
    }

    pub async fn get_inventory_in_namespace(
        &self,
        policy: String,
        namespace: String,
    ) -> SyncResult<Vec<InventoryItem>> {
        self.run(move |db| db.get_inventory_by_policy_and_namespace(&policy, &namespace))
            .await
    }

    pub async fn pending_counts(&self) -> SyncResult<PendingCounts> {
        self.run(|db| db.pending_counts()).await
    }

    /// Shutdown the store thread
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| SyncError::StoreClosed)
    }
}
