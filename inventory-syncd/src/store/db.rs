use std::path::Path;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Params, Row, params};
use serde::Serialize;
use serde_json::Value;
use shared::types::{
    Device, EntityKind, Interface, InventoryItem, NaturalKey, RecordBatch, Vlan, UNSYNCED,
};
use crate::error::{BatchErrors, SyncError, SyncResult};
use crate::store::observed;

/// Records produced by one `save` call plus the failures joined along the way.
#[derive(Debug)]
pub struct Saved {
    pub records: RecordBatch,
    pub errors: BatchErrors,
}

/// Number of records per kind still waiting for a remote id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub devices: u64,
    pub interfaces: u64,
    pub vlans: u64,
    pub inventory: u64,
}

const DEVICE_COLUMNS: &str = "id, policy, namespace, hostname, serial_number, address, model, \
    state, vendor, os, config, blob, remote_id, first_seen, last_seen";

const INTERFACE_COLUMNS: &str = "id, policy, namespace, hostname, name, admin_state, mtu, speed, \
    mac_address, if_type, ip_addresses, config, blob, remote_id, first_seen, last_seen";

const VLAN_COLUMNS: &str = "id, policy, namespace, hostname, name, vid, state, \
    config, blob, remote_id, first_seen, last_seen";

const INVENTORY_COLUMNS: &str = "id, policy, namespace, hostname, name, vendor, serial, \
    part_number, description, item_type, config, blob, remote_id, first_seen, last_seen";

pub struct InventoryDb {
    conn: Connection,
}

impl InventoryDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Enable WAL mode
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        // Create tables if they don't exist
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id            TEXT PRIMARY KEY,
                policy        TEXT NOT NULL,
                namespace     TEXT NOT NULL,
                hostname      TEXT NOT NULL,
                serial_number TEXT NOT NULL,
                address       TEXT NOT NULL,
                model         TEXT NOT NULL,
                state         TEXT NOT NULL,
                vendor        TEXT NOT NULL,
                os            TEXT NOT NULL,
                config        TEXT NOT NULL,
                blob          TEXT NOT NULL,
                remote_id     INTEGER NOT NULL DEFAULT -1,
                first_seen    TEXT NOT NULL,
                last_seen     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_devices_key
                ON devices(policy, namespace, hostname);
            CREATE INDEX IF NOT EXISTS idx_devices_hostname ON devices(hostname);

            CREATE TABLE IF NOT EXISTS interfaces (
                id           TEXT PRIMARY KEY,
                policy       TEXT NOT NULL,
                namespace    TEXT NOT NULL,
                hostname     TEXT NOT NULL,
                name         TEXT NOT NULL,
                admin_state  TEXT NOT NULL,
                mtu          INTEGER NOT NULL,
                speed        INTEGER NOT NULL,
                mac_address  TEXT NOT NULL,
                if_type      TEXT NOT NULL,
                ip_addresses TEXT NOT NULL,
                config       TEXT NOT NULL,
                blob         TEXT NOT NULL,
                remote_id    INTEGER NOT NULL DEFAULT -1,
                first_seen   TEXT NOT NULL,
                last_seen    TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_interfaces_key
                ON interfaces(policy, namespace, hostname, name);
            CREATE INDEX IF NOT EXISTS idx_interfaces_name ON interfaces(name);

            CREATE TABLE IF NOT EXISTS vlans (
                id         TEXT PRIMARY KEY,
                policy     TEXT NOT NULL,
                namespace  TEXT NOT NULL,
                hostname   TEXT NOT NULL,
                name       TEXT NOT NULL,
                vid        INTEGER NOT NULL,
                state      TEXT NOT NULL,
                config     TEXT NOT NULL,
                blob       TEXT NOT NULL,
                remote_id  INTEGER NOT NULL DEFAULT -1,
                first_seen TEXT NOT NULL,
                last_seen  TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_vlans_key
                ON vlans(policy, namespace, hostname, name);
            CREATE INDEX IF NOT EXISTS idx_vlans_name ON vlans(name);

            CREATE TABLE IF NOT EXISTS inventory_items (
                id          TEXT PRIMARY KEY,
                policy      TEXT NOT NULL,
                namespace   TEXT NOT NULL,
                hostname    TEXT NOT NULL,
                name        TEXT NOT NULL,
                vendor      TEXT NOT NULL,
                serial      TEXT NOT NULL,
                part_number TEXT NOT NULL,
                description TEXT NOT NULL,
                item_type   TEXT NOT NULL,
                config      TEXT NOT NULL,
                blob        TEXT NOT NULL,
                remote_id   INTEGER NOT NULL DEFAULT -1,
                first_seen  TEXT NOT NULL,
                last_seen   TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_inventory_key
                ON inventory_items(policy, namespace, hostname, name);
            CREATE INDEX IF NOT EXISTS idx_inventory_name ON inventory_items(name);
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Upsert every item of an observed payload by natural key.
    ///
    /// Malformed items are logged and skipped. Persistence failures are joined
    /// into `Saved::errors` while the remaining items are still attempted.
    pub fn save(&self, policy: &str, payload: &Value) -> SyncResult<Saved> {
        let batch = observed::split(payload)?;
        let now = Utc::now();
        let mut errors = BatchErrors::new();

        let records = match batch.kind {
            EntityKind::Device => RecordBatch::Devices(self.save_items(
                batch.items,
                &mut errors,
                |item| observed::device(policy, &batch.config, item, now),
                |d| self.upsert_device(&d),
            )),
            EntityKind::Interface => RecordBatch::Interfaces(self.save_items(
                batch.items,
                &mut errors,
                |item| observed::interface(policy, &batch.config, item, now),
                |i| self.upsert_interface(&i),
            )),
            EntityKind::Vlan => RecordBatch::Vlans(self.save_items(
                batch.items,
                &mut errors,
                |item| observed::vlan(policy, &batch.config, item, now),
                |v| self.upsert_vlan(&v),
            )),
            EntityKind::Inventory => RecordBatch::Inventory(self.save_items(
                batch.items,
                &mut errors,
                |item| observed::inventory_item(policy, &batch.config, item, now),
                |i| self.upsert_inventory_item(&i),
            )),
        };

        Ok(Saved { records, errors })
    }

    fn save_items<T>(
        &self,
        items: &[Value],
        errors: &mut BatchErrors,
        decode: impl Fn(&Value) -> SyncResult<T>,
        upsert: impl Fn(T) -> SyncResult<T>,
    ) -> Vec<T> {
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let record = match decode(item) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed item");
                    continue;
                }
            };
            match upsert(record) {
                Ok(record) => stored.push(record),
                Err(e) => errors.push(e),
            }
        }
        stored
    }

    /// Insert a device or refresh the existing row with the same natural key.
    /// The stored id, remote id and first-seen time survive re-observation.
    pub fn upsert_device(&self, device: &Device) -> SyncResult<Device> {
        self.conn.execute(
            &format!(
                r#"
                INSERT INTO devices ({DEVICE_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ON CONFLICT(policy, namespace, hostname) DO UPDATE SET
                    serial_number = excluded.serial_number,
                    address = excluded.address,
                    model = excluded.model,
                    state = excluded.state,
                    vendor = excluded.vendor,
                    os = excluded.os,
                    config = excluded.config,
                    blob = excluded.blob,
                    last_seen = excluded.last_seen
                "#
            ),
            params![
                &device.id,
                &device.policy,
                &device.namespace,
                &device.hostname,
                &device.serial_number,
                &device.address,
                &device.model,
                &device.state,
                &device.vendor,
                &device.os,
                device.config.to_string(),
                &device.blob,
                UNSYNCED,
                device.first_seen.to_rfc3339(),
                device.last_seen.to_rfc3339(),
            ],
        )?;

        self.get_device_by_policy_namespace_hostname(&device.policy, &device.namespace, &device.hostname)
    }

    pub fn upsert_interface(&self, ifce: &Interface) -> SyncResult<Interface> {
        let addresses = serde_json::to_string(&ifce.ip_addresses).map_err(|e| SyncError::Parse {
            kind: EntityKind::Interface.as_str(),
            message: e.to_string(),
        })?;

        self.conn.execute(
            &format!(
                r#"
                INSERT INTO interfaces ({INTERFACE_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT(policy, namespace, hostname, name) DO UPDATE SET
                    admin_state = excluded.admin_state,
                    mtu = excluded.mtu,
                    speed = excluded.speed,
                    mac_address = excluded.mac_address,
                    if_type = excluded.if_type,
                    ip_addresses = excluded.ip_addresses,
                    config = excluded.config,
                    blob = excluded.blob,
                    last_seen = excluded.last_seen
                "#
            ),
            params![
                &ifce.id,
                &ifce.policy,
                &ifce.namespace,
                &ifce.hostname,
                &ifce.name,
                &ifce.admin_state,
                ifce.mtu,
                ifce.speed,
                &ifce.mac_address,
                &ifce.if_type,
                addresses,
                ifce.config.to_string(),
                &ifce.blob,
                UNSYNCED,
                ifce.first_seen.to_rfc3339(),
                ifce.last_seen.to_rfc3339(),
            ],
        )?;

        self.query_interfaces(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3 AND name = ?4",
            params![&ifce.policy, &ifce.namespace, &ifce.hostname, &ifce.name],
        )?
        .pop()
        .ok_or_else(|| not_found(EntityKind::Interface, &key_of(&ifce.policy, &ifce.namespace, &ifce.hostname, Some(&ifce.name))))
    }

    pub fn upsert_vlan(&self, vlan: &Vlan) -> SyncResult<Vlan> {
        self.conn.execute(
            &format!(
                r#"
                INSERT INTO vlans ({VLAN_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(policy, namespace, hostname, name) DO UPDATE SET
                    vid = excluded.vid,
                    state = excluded.state,
                    config = excluded.config,
                    blob = excluded.blob,
                    last_seen = excluded.last_seen
                "#
            ),
            params![
                &vlan.id,
                &vlan.policy,
                &vlan.namespace,
                &vlan.hostname,
                &vlan.name,
                vlan.vid,
                &vlan.state,
                vlan.config.to_string(),
                &vlan.blob,
                UNSYNCED,
                vlan.first_seen.to_rfc3339(),
                vlan.last_seen.to_rfc3339(),
            ],
        )?;

        self.query_vlans(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3 AND name = ?4",
            params![&vlan.policy, &vlan.namespace, &vlan.hostname, &vlan.name],
        )?
        .pop()
        .ok_or_else(|| not_found(EntityKind::Vlan, &key_of(&vlan.policy, &vlan.namespace, &vlan.hostname, Some(&vlan.name))))
    }

    pub fn upsert_inventory_item(&self, item: &InventoryItem) -> SyncResult<InventoryItem> {
        self.conn.execute(
            &format!(
                r#"
                INSERT INTO inventory_items ({INVENTORY_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ON CONFLICT(policy, namespace, hostname, name) DO UPDATE SET
                    vendor = excluded.vendor,
                    serial = excluded.serial,
                    part_number = excluded.part_number,
                    description = excluded.description,
                    item_type = excluded.item_type,
                    config = excluded.config,
                    blob = excluded.blob,
                    last_seen = excluded.last_seen
                "#
            ),
            params![
                &item.id,
                &item.policy,
                &item.namespace,
                &item.hostname,
                &item.name,
                &item.vendor,
                &item.serial,
                &item.part_number,
                &item.description,
                &item.item_type,
                item.config.to_string(),
                &item.blob,
                UNSYNCED,
                item.first_seen.to_rfc3339(),
                item.last_seen.to_rfc3339(),
            ],
        )?;

        self.query_inventory(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3 AND name = ?4",
            params![&item.policy, &item.namespace, &item.hostname, &item.name],
        )?
        .pop()
        .ok_or_else(|| not_found(EntityKind::Inventory, &key_of(&item.policy, &item.namespace, &item.hostname, Some(&item.name))))
    }

    pub fn update_device_remote_id(&self, id: &str, remote_id: i64) -> SyncResult<Device> {
        self.set_remote_id("devices", EntityKind::Device, id, remote_id)?;
        self.query_devices("id = ?1", [id])?
            .pop()
            .ok_or_else(|| not_found(EntityKind::Device, id))
    }

    pub fn update_interface_remote_id(&self, id: &str, remote_id: i64) -> SyncResult<Interface> {
        self.set_remote_id("interfaces", EntityKind::Interface, id, remote_id)?;
        self.query_interfaces("id = ?1", [id])?
            .pop()
            .ok_or_else(|| not_found(EntityKind::Interface, id))
    }

    pub fn update_vlan_remote_id(&self, id: &str, remote_id: i64) -> SyncResult<Vlan> {
        self.set_remote_id("vlans", EntityKind::Vlan, id, remote_id)?;
        self.query_vlans("id = ?1", [id])?
            .pop()
            .ok_or_else(|| not_found(EntityKind::Vlan, id))
    }

    pub fn update_inventory_remote_id(&self, id: &str, remote_id: i64) -> SyncResult<InventoryItem> {
        self.set_remote_id("inventory_items", EntityKind::Inventory, id, remote_id)?;
        self.query_inventory("id = ?1", [id])?
            .pop()
            .ok_or_else(|| not_found(EntityKind::Inventory, id))
    }

    /// The sync marker only ever moves forward to a real remote id.
    fn set_remote_id(&self, table: &str, kind: EntityKind, id: &str, remote_id: i64) -> SyncResult<()> {
        if remote_id <= 0 {
            return Err(SyncError::InvalidRemoteId { kind, id: id.to_string(), remote_id });
        }

        let updated = self.conn.execute(
            &format!("UPDATE {} SET remote_id = ?1 WHERE id = ?2", table),
            params![remote_id, id],
        )?;

        if updated == 0 {
            return Err(not_found(kind, id));
        }
        Ok(())
    }

    pub fn get_device_by_policy_namespace_hostname(
        &self,
        policy: &str,
        namespace: &str,
        hostname: &str,
    ) -> SyncResult<Device> {
        self.query_devices(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3",
            params![policy, namespace, hostname],
        )?
        .pop()
        .ok_or_else(|| not_found(EntityKind::Device, &key_of(policy, namespace, hostname, None)))
    }

    /// Devices observed under this hostname by any policy or namespace
    pub fn get_devices_by_name(&self, hostname: &str) -> SyncResult<Vec<Device>> {
        self.query_devices("hostname = ?1", [hostname])
    }

    pub fn get_devices_by_policy_and_namespace(&self, policy: &str, namespace: &str) -> SyncResult<Vec<Device>> {
        self.query_devices("policy = ?1 AND namespace = ?2", [policy, namespace])
    }

    pub fn get_interfaces_by_policy_namespace_hostname(
        &self,
        policy: &str,
        namespace: &str,
        hostname: &str,
    ) -> SyncResult<Vec<Interface>> {
        self.query_interfaces(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3",
            [policy, namespace, hostname],
        )
    }

    pub fn get_interfaces_by_name(&self, name: &str) -> SyncResult<Vec<Interface>> {
        self.query_interfaces("name = ?1", [name])
    }

    pub fn get_interfaces_by_policy_and_namespace(&self, policy: &str, namespace: &str) -> SyncResult<Vec<Interface>> {
        self.query_interfaces("policy = ?1 AND namespace = ?2", [policy, namespace])
    }

    pub fn get_vlans_by_policy_namespace_hostname(
        &self,
        policy: &str,
        namespace: &str,
        hostname: &str,
    ) -> SyncResult<Vec<Vlan>> {
        self.query_vlans(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3",
            [policy, namespace, hostname],
        )
    }

    pub fn get_vlans_by_name(&self, name: &str) -> SyncResult<Vec<Vlan>> {
        self.query_vlans("name = ?1", [name])
    }

    pub fn get_vlans_by_policy_and_namespace(&self, policy: &str, namespace: &str) -> SyncResult<Vec<Vlan>> {
        self.query_vlans("policy = ?1 AND namespace = ?2", [policy, namespace])
    }

    pub fn get_inventory_by_policy_namespace_hostname(
        &self,
        policy: &str,
        namespace: &str,
        hostname: &str,
    ) -> SyncResult<Vec<InventoryItem>> {
        self.query_inventory(
            "policy = ?1 AND namespace = ?2 AND hostname = ?3",
            [policy, namespace, hostname],
        )
    }

    pub fn get_inventory_by_name(&self, name: &str) -> SyncResult<Vec<InventoryItem>> {
        self.query_inventory("name = ?1", [name])
    }

    pub fn get_inventory_by_policy_and_namespace(&self, policy: &str, namespace: &str) -> SyncResult<Vec<InventoryItem>> {
        self.query_inventory("policy = ?1 AND namespace = ?2", [policy, namespace])
    }

    pub fn pending_counts(&self) -> SyncResult<PendingCounts> {
        let count = |table: &str| -> SyncResult<u64> {
            let n: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE remote_id = ?1", table),
                [UNSYNCED],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        };

        Ok(PendingCounts {
            devices: count("devices")?,
            interfaces: count("interfaces")?,
            vlans: count("vlans")?,
            inventory: count("inventory_items")?,
        })
    }

    fn query_devices<P: Params>(&self, filter: &str, params: P) -> SyncResult<Vec<Device>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE {filter} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params, Self::row_to_device)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_interfaces<P: Params>(&self, filter: &str, params: P) -> SyncResult<Vec<Interface>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INTERFACE_COLUMNS} FROM interfaces WHERE {filter} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params, Self::row_to_interface)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_vlans<P: Params>(&self, filter: &str, params: P) -> SyncResult<Vec<Vlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VLAN_COLUMNS} FROM vlans WHERE {filter} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params, Self::row_to_vlan)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_inventory<P: Params>(&self, filter: &str, params: P) -> SyncResult<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE {filter} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params, Self::row_to_inventory)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_device(row: &Row) -> Result<Device, rusqlite::Error> {
        Ok(Device {
            id: row.get(0)?,
            policy: row.get(1)?,
            namespace: row.get(2)?,
            hostname: row.get(3)?,
            serial_number: row.get(4)?,
            address: row.get(5)?,
            model: row.get(6)?,
            state: row.get(7)?,
            vendor: row.get(8)?,
            os: row.get(9)?,
            config: json_column(row, 10)?,
            blob: row.get(11)?,
            remote_id: row.get(12)?,
            first_seen: time_column(row, 13)?,
            last_seen: time_column(row, 14)?,
        })
    }

    fn row_to_interface(row: &Row) -> Result<Interface, rusqlite::Error> {
        Ok(Interface {
            id: row.get(0)?,
            policy: row.get(1)?,
            namespace: row.get(2)?,
            hostname: row.get(3)?,
            name: row.get(4)?,
            admin_state: row.get(5)?,
            mtu: row.get(6)?,
            speed: row.get(7)?,
            mac_address: row.get(8)?,
            if_type: row.get(9)?,
            ip_addresses: json_column(row, 10)?,
            config: json_column(row, 11)?,
            blob: row.get(12)?,
            remote_id: row.get(13)?,
            first_seen: time_column(row, 14)?,
            last_seen: time_column(row, 15)?,
        })
    }

    fn row_to_vlan(row: &Row) -> Result<Vlan, rusqlite::Error> {
        Ok(Vlan {
            id: row.get(0)?,
            policy: row.get(1)?,
            namespace: row.get(2)?,
            hostname: row.get(3)?,
            name: row.get(4)?,
            vid: row.get(5)?,
            state: row.get(6)?,
            config: json_column(row, 7)?,
            blob: row.get(8)?,
            remote_id: row.get(9)?,
            first_seen: time_column(row, 10)?,
            last_seen: time_column(row, 11)?,
        })
    }

    fn row_to_inventory(row: &Row) -> Result<InventoryItem, rusqlite::Error> {
        Ok(InventoryItem {
            id: row.get(0)?,
            policy: row.get(1)?,
            namespace: row.get(2)?,
            hostname: row.get(3)?,
            name: row.get(4)?,
            vendor: row.get(5)?,
            serial: row.get(6)?,
            part_number: row.get(7)?,
            description: row.get(8)?,
            item_type: row.get(9)?,
            config: json_column(row, 10)?,
            blob: row.get(11)?,
            remote_id: row.get(12)?,
            first_seen: time_column(row, 13)?,
            last_seen: time_column(row, 14)?,
        })
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> Result<T, rusqlite::Error> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn time_column(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn key_of(policy: &str, namespace: &str, hostname: &str, name: Option<&str>) -> String {
    NaturalKey {
        policy: policy.to_string(),
        namespace: namespace.to_string(),
        hostname: hostname.to_string(),
        name: name.map(str::to_string),
    }
    .to_string()
}

fn not_found(kind: EntityKind, id: &str) -> SyncError {
    SyncError::NotFound { kind, id: id.to_string() }
}
