//! Idempotent create-or-get client for the inventory system.
//!
//! Every object is looked up by its natural key before it is created, and the
//! first match wins. Taxonomy objects the observation did not name are
//! replaced by an "Unknown" placeholder whose id is memoized for the life of
//! the client. The client is owned by the single reconciliation worker, so
//! the cache is plain mutable state.

use std::net::IpAddr;
use anyhow::Context;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use shared::protocol::{
    device_status, interface_enabled, DISCOVERED_SITE_STATUS, DISCOVERED_TAG_COLOR,
    DISCOVERED_TAG_NAME, INTERFACE_MTU_MIN, INTERFACE_SPEED_MAX, PLACEHOLDER_SITE_STATUS,
    PLACEHOLDER_TAG_COLOR, PLACEHOLDER_TAG_NAME, UNKNOWN_INTERFACE_TYPE, UNKNOWN_NAME,
};
use crate::config::NetboxConfig;
use crate::error::{SyncError, SyncResult};
use crate::netbox::slug::slugify;
use crate::netbox::types::{
    DeviceTypeRef, NamedObject, NetboxDevice, NetboxInterface, NetboxInventoryItem,
    NetboxIpAddress, NetboxVlan, ObjectId, Page, PlatformRef, TagRef,
};

const STATUS_PATH: &str = "/api/status/";
const DEVICES_PATH: &str = "/api/dcim/devices/";
const INTERFACES_PATH: &str = "/api/dcim/interfaces/";
const INVENTORY_ITEMS_PATH: &str = "/api/dcim/inventory-items/";
const IP_ADDRESSES_PATH: &str = "/api/ipam/ip-addresses/";
const VLANS_PATH: &str = "/api/ipam/vlans/";

/// Taxonomy object kinds resolved by slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Tag,
    Site,
    DeviceRole,
    DeviceType,
    Manufacturer,
    Platform,
}

impl Taxonomy {
    fn path(&self) -> &'static str {
        match self {
            Taxonomy::Tag => "/api/extras/tags/",
            Taxonomy::Site => "/api/dcim/sites/",
            Taxonomy::DeviceRole => "/api/dcim/device-roles/",
            Taxonomy::DeviceType => "/api/dcim/device-types/",
            Taxonomy::Manufacturer => "/api/dcim/manufacturers/",
            Taxonomy::Platform => "/api/dcim/platforms/",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Taxonomy::Tag => "tag",
            Taxonomy::Site => "site",
            Taxonomy::DeviceRole => "device role",
            Taxonomy::DeviceType => "device type",
            Taxonomy::Manufacturer => "manufacturer",
            Taxonomy::Platform => "platform",
        }
    }
}

/// Ids of the "Unknown" stand-ins, filled on first use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceholderIds {
    pub site: Option<i64>,
    pub role: Option<i64>,
    pub device_type: Option<i64>,
    pub manufacturer: Option<i64>,
    pub platform: Option<i64>,
}

#[derive(Debug, Clone)]
struct Tags {
    discovered: Vec<TagRef>,
    /// Placeholder plus Discovered
    placeholder: Vec<TagRef>,
}

pub struct NetboxClient {
    http: Client,
    base_url: String,
    cancel: CancellationToken,
    tags: Option<Tags>,
    placeholders: PlaceholderIds,
}

impl std::fmt::Debug for NetboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetboxClient")
            .field("base_url", &self.base_url)
            .field("placeholders", &self.placeholders)
            .finish()
    }
}

impl NetboxClient {
    pub fn new(config: &NetboxConfig, cancel: CancellationToken) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {}", config.token))
            .context("Invalid characters in netbox token")?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            cancel,
            tags: None,
            placeholders: PlaceholderIds::default(),
        })
    }

    pub fn placeholders(&self) -> PlaceholderIds {
        self.placeholders
    }

    /// Verify the inventory system is reachable and the token is accepted.
    pub async fn check_status(&self) -> SyncResult<()> {
        let resp = self.send("status", self.http.get(self.url(STATUS_PATH))).await?;
        Self::expect_success("status", resp).await?;
        Ok(())
    }

    pub async fn create_device(&mut self, device: &NetboxDevice) -> SyncResult<i64> {
        let tags = self.ensure_tags().await?;

        let site_id = self.resolve_site(device.site.as_ref(), &tags).await?;
        let role_id = self.resolve_role(device.role.as_ref(), &tags).await?;
        let type_id = self.resolve_device_type(device.device_type.as_ref(), &tags).await?;
        let platform_id = self.resolve_platform(device.platform.as_ref(), &tags).await?;

        let query = [("name", device.name.clone()), ("site_id", site_id.to_string())];
        if let Some(id) = self.lookup("lookup device", DEVICES_PATH, &query).await? {
            tracing::debug!(device = %device.name, remote_id = id, "Device already present");
            return Ok(id);
        }

        let mut body = json!({
            "name": device.name,
            "site": site_id,
            "role": role_id,
            "device_type": type_id,
            "platform": platform_id,
            "serial": device.serial,
            "tags": tags.discovered,
        });
        if let Some(status) = device_status(&device.status) {
            body["status"] = json!(status);
        }

        let id = self.post("create device", DEVICES_PATH, &body).await?;
        tracing::info!(device = %device.name, remote_id = id, "Device created");
        Ok(id)
    }

    pub async fn create_interface(&mut self, ifce: &NetboxInterface) -> SyncResult<i64> {
        let tags = self.ensure_tags().await?;

        let query = [("device_id", ifce.device_id.to_string()), ("name", ifce.name.clone())];
        if let Some(id) = self.lookup("lookup interface", INTERFACES_PATH, &query).await? {
            tracing::debug!(interface = %ifce.name, remote_id = id, "Interface already present");
            return Ok(id);
        }

        let mut body = Map::new();
        body.insert("device".into(), json!(ifce.device_id));
        body.insert("name".into(), json!(ifce.name));
        body.insert("type".into(), json!(UNKNOWN_INTERFACE_TYPE));
        body.insert("description".into(), json!(ifce.if_type));
        body.insert("tags".into(), json!(tags.discovered));
        if ifce.mtu >= INTERFACE_MTU_MIN {
            body.insert("mtu".into(), json!(ifce.mtu));
        }
        if ifce.speed > 0 && ifce.speed < INTERFACE_SPEED_MAX {
            body.insert("speed".into(), json!(ifce.speed));
        }
        if !ifce.mac_address.is_empty() {
            body.insert("mac_address".into(), json!(ifce.mac_address));
        }
        if let Some(enabled) = interface_enabled(&ifce.state) {
            body.insert("enabled".into(), json!(enabled));
        }

        let id = self.post("create interface", INTERFACES_PATH, &Value::Object(body)).await?;
        tracing::info!(interface = %ifce.name, remote_id = id, "Interface created");
        Ok(id)
    }

    pub async fn create_interface_ip_address(&mut self, ip: &NetboxIpAddress) -> SyncResult<i64> {
        let tags = self.ensure_tags().await?;

        let query = [
            ("address", ip.address.clone()),
            ("interface_id", ip.assigned_object_id.to_string()),
        ];
        if let Some(id) = self.lookup("lookup ip address", IP_ADDRESSES_PATH, &query).await? {
            return Ok(id);
        }

        let body = json!({
            "address": ip.address,
            "assigned_object_type": ip.assigned_object_type,
            "assigned_object_id": ip.assigned_object_id,
            "tags": tags.discovered,
        });

        let id = self.post("create ip address", IP_ADDRESSES_PATH, &body).await?;
        tracing::info!(address = %ip.address, remote_id = id, "IP address for interface created");
        Ok(id)
    }

    pub async fn create_inventory_item(&mut self, item: &NetboxInventoryItem) -> SyncResult<i64> {
        let tags = self.ensure_tags().await?;

        let query = [("device_id", item.device_id.to_string()), ("name", item.name.clone())];
        if let Some(id) = self.lookup("lookup inventory item", INVENTORY_ITEMS_PATH, &query).await? {
            return Ok(id);
        }

        let mut body = json!({
            "device": item.device_id,
            "name": item.name,
            "part_id": item.part_id,
            "serial": item.serial,
            "description": item.description,
            "label": item.label,
            "tags": tags.discovered,
        });
        if let Some(mfr) = &item.manufacturer {
            let slug = slugify(&mfr.name);
            let mfr_body = json!({"name": mfr.name, "slug": slug, "tags": tags.discovered});
            let mfr_id = self.lookup_or_create(Taxonomy::Manufacturer, &slug, &mfr_body).await?;
            body["manufacturer"] = json!(mfr_id);
        }

        let id = self.post("create inventory item", INVENTORY_ITEMS_PATH, &body).await?;
        tracing::info!(item = %item.name, remote_id = id, "Inventory item created");
        Ok(id)
    }

    pub async fn create_vlan(&mut self, vlan: &NetboxVlan) -> SyncResult<i64> {
        let tags = self.ensure_tags().await?;

        let query = [("vid", vlan.vid.to_string()), ("name", vlan.name.clone())];
        if let Some(id) = self.lookup("lookup vlan", VLANS_PATH, &query).await? {
            return Ok(id);
        }

        let body = json!({
            "vid": vlan.vid,
            "name": vlan.name,
            "status": vlan.status,
            "tags": tags.discovered,
        });

        let id = self.post("create vlan", VLANS_PATH, &body).await?;
        tracing::info!(vlan = %vlan.name, vid = vlan.vid, remote_id = id, "VLAN created");
        Ok(id)
    }

    /// Point the device's primary address at an IP object already assigned
    /// to one of its interfaces. Returns false when no such object exists.
    pub async fn assign_primary_ip(&mut self, device_id: i64, address: IpAddr) -> SyncResult<bool> {
        let query = [("device_id", device_id.to_string()), ("address", address.to_string())];
        let Some(ip_id) = self.lookup("lookup primary ip", IP_ADDRESSES_PATH, &query).await? else {
            return Ok(false);
        };

        let field = match address {
            IpAddr::V4(_) => "primary_ip4",
            IpAddr::V6(_) => "primary_ip6",
        };
        let mut body = Map::new();
        body.insert(field.into(), json!(ip_id));

        let path = format!("{}{}/", DEVICES_PATH, device_id);
        let resp = self
            .send("assign primary ip", self.http.patch(self.url(&path)).json(&body))
            .await?;
        Self::expect_success("assign primary ip", resp).await?;

        tracing::info!(remote_id = device_id, address = %address, "Primary IP assigned");
        Ok(true)
    }

    async fn ensure_tags(&mut self) -> SyncResult<Tags> {
        if let Some(tags) = &self.tags {
            return Ok(tags.clone());
        }

        let discovered = self.ensure_tag(DISCOVERED_TAG_NAME, DISCOVERED_TAG_COLOR).await?;
        let placeholder = self.ensure_tag(PLACEHOLDER_TAG_NAME, PLACEHOLDER_TAG_COLOR).await?;

        let tags = Tags {
            discovered: vec![discovered.clone()],
            placeholder: vec![placeholder, discovered],
        };
        self.tags = Some(tags.clone());
        Ok(tags)
    }

    async fn ensure_tag(&self, name: &str, color: &str) -> SyncResult<TagRef> {
        let slug = slugify(name);
        let body = json!({"name": name, "slug": slug, "color": color});
        self.lookup_or_create(Taxonomy::Tag, &slug, &body).await?;
        Ok(TagRef { name: name.to_string(), slug })
    }

    async fn resolve_site(&mut self, site: Option<&NamedObject>, tags: &Tags) -> SyncResult<i64> {
        if let Some(site) = site {
            let slug = slugify(&site.name);
            let body = json!({
                "name": site.name,
                "slug": slug,
                "status": DISCOVERED_SITE_STATUS,
                "tags": tags.discovered,
            });
            return self.lookup_or_create(Taxonomy::Site, &slug, &body).await;
        }

        if let Some(id) = self.placeholders.site {
            return Ok(id);
        }
        let slug = slugify(UNKNOWN_NAME);
        let body = json!({
            "name": UNKNOWN_NAME,
            "slug": slug,
            "status": PLACEHOLDER_SITE_STATUS,
            "tags": tags.placeholder,
        });
        let id = self.lookup_or_create(Taxonomy::Site, &slug, &body).await?;
        self.placeholders.site = Some(id);
        Ok(id)
    }

    async fn resolve_role(&mut self, role: Option<&NamedObject>, tags: &Tags) -> SyncResult<i64> {
        if let Some(role) = role {
            let slug = slugify(&role.name);
            let body = json!({"name": role.name, "slug": slug, "tags": tags.discovered});
            return self.lookup_or_create(Taxonomy::DeviceRole, &slug, &body).await;
        }

        if let Some(id) = self.placeholders.role {
            return Ok(id);
        }
        let slug = slugify(UNKNOWN_NAME);
        let body = json!({"name": UNKNOWN_NAME, "slug": slug, "tags": tags.placeholder});
        let id = self.lookup_or_create(Taxonomy::DeviceRole, &slug, &body).await?;
        self.placeholders.role = Some(id);
        Ok(id)
    }

    async fn resolve_manufacturer(&mut self, mfr: Option<&NamedObject>, tags: &Tags) -> SyncResult<i64> {
        if let Some(mfr) = mfr {
            let slug = slugify(&mfr.name);
            let body = json!({"name": mfr.name, "slug": slug, "tags": tags.discovered});
            return self.lookup_or_create(Taxonomy::Manufacturer, &slug, &body).await;
        }

        if let Some(id) = self.placeholders.manufacturer {
            return Ok(id);
        }
        let slug = slugify(UNKNOWN_NAME);
        let body = json!({"name": UNKNOWN_NAME, "slug": slug, "tags": tags.placeholder});
        let id = self.lookup_or_create(Taxonomy::Manufacturer, &slug, &body).await?;
        self.placeholders.manufacturer = Some(id);
        Ok(id)
    }

    /// The manufacturer is only resolved when the device type has to be created.
    async fn resolve_device_type(&mut self, dtype: Option<&DeviceTypeRef>, tags: &Tags) -> SyncResult<i64> {
        let placeholder = dtype.is_none();
        if placeholder {
            if let Some(id) = self.placeholders.device_type {
                return Ok(id);
            }
        }

        let model = dtype.map(|d| d.model.as_str()).unwrap_or(UNKNOWN_NAME);
        let slug = slugify(model);
        let kind = Taxonomy::DeviceType;

        let id = match self.lookup_taxonomy(kind, &slug).await? {
            Some(id) => id,
            None => {
                let mfr = dtype.and_then(|d| d.manufacturer.as_ref());
                let mfr_id = self.resolve_manufacturer(mfr, tags).await?;
                let tag_set = if placeholder { &tags.placeholder } else { &tags.discovered };
                let body = json!({
                    "model": model,
                    "slug": slug,
                    "manufacturer": mfr_id,
                    "tags": tag_set,
                });
                self.create_taxonomy(kind, &slug, &body).await?
            }
        };

        if placeholder {
            self.placeholders.device_type = Some(id);
        }
        Ok(id)
    }

    async fn resolve_platform(&mut self, platform: Option<&PlatformRef>, tags: &Tags) -> SyncResult<i64> {
        let placeholder = platform.is_none();
        if placeholder {
            if let Some(id) = self.placeholders.platform {
                return Ok(id);
            }
        }

        let name = platform.map(|p| p.name.as_str()).unwrap_or(UNKNOWN_NAME);
        let slug = slugify(name);
        let kind = Taxonomy::Platform;

        let id = match self.lookup_taxonomy(kind, &slug).await? {
            Some(id) => id,
            None => {
                let mfr = platform.and_then(|p| p.manufacturer.as_ref());
                let mfr_id = self.resolve_manufacturer(mfr, tags).await?;
                let tag_set = if placeholder { &tags.placeholder } else { &tags.discovered };
                let body = json!({
                    "name": name,
                    "slug": slug,
                    "manufacturer": mfr_id,
                    "tags": tag_set,
                });
                self.create_taxonomy(kind, &slug, &body).await?
            }
        };

        if placeholder {
            self.placeholders.platform = Some(id);
        }
        Ok(id)
    }

    async fn lookup_or_create(&self, kind: Taxonomy, slug: &str, body: &Value) -> SyncResult<i64> {
        match self.lookup_taxonomy(kind, slug).await? {
            Some(id) => Ok(id),
            None => self.create_taxonomy(kind, slug, body).await,
        }
    }

    async fn lookup_taxonomy(&self, kind: Taxonomy, slug: &str) -> SyncResult<Option<i64>> {
        let operation = format!("lookup {}", kind.label());
        self.lookup(&operation, kind.path(), &[("slug", slug.to_string())]).await
    }

    async fn create_taxonomy(&self, kind: Taxonomy, slug: &str, body: &Value) -> SyncResult<i64> {
        let operation = format!("create {}", kind.label());
        match self.post(&operation, kind.path(), body).await {
            Ok(id) => {
                tracing::info!(kind = kind.label(), slug, remote_id = id, "Taxonomy object created");
                Ok(id)
            }
            Err(SyncError::RemoteCall { status: Some(400), message, .. })
                if message.contains("already exists") =>
            {
                Err(SyncError::DuplicateTaxonomy { kind: kind.label(), slug: slug.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    /// First match of a filtered list query, if any
    async fn lookup(&self, operation: &str, path: &str, query: &[(&str, String)]) -> SyncResult<Option<i64>> {
        let resp = self
            .send(operation, self.http.get(self.url(path)).query(query))
            .await?;
        let resp = Self::expect_success(operation, resp).await?;
        let page: Page<ObjectId> = resp
            .json()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;

        if page.count > 1 {
            tracing::debug!(operation, count = page.count, "Several matches, using the first");
        }
        Ok(page.results.first().map(|o| o.id))
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, path: &str, body: &B) -> SyncResult<i64> {
        let resp = self
            .send(operation, self.http.post(self.url(path)).json(body))
            .await?;
        let resp = Self::expect_success(operation, resp).await?;
        let created: ObjectId = resp
            .json()
            .await
            .map_err(|e| SyncError::remote(operation, e))?;
        Ok(created.id)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> SyncResult<Response> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = request.send() => result.map_err(|e| SyncError::remote(operation, e)),
        }
    }

    async fn expect_success(operation: &str, resp: Response) -> SyncResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::RemoteCall {
            operation: operation.to_string(),
            status: Some(status.as_u16()),
            message: body,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn page(ids: &[i64]) -> Value {
        json!({
            "count": ids.len(),
            "results": ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        })
    }

    pub(crate) fn test_client(server: &MockServer) -> NetboxClient {
        let config = NetboxConfig {
            endpoint: format!("{}/", server.uri()),
            token: "secret".to_string(),
        };
        NetboxClient::new(&config, CancellationToken::new()).unwrap()
    }

    /// Both tags already exist.
    pub(crate) async fn mount_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/extras/tags/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1])))
            .mount(server)
            .await;
    }

    /// Empty lookups for every taxonomy and device, sequential ids on create.
    pub(crate) async fn mount_empty_taxonomy(server: &MockServer) {
        for (p, id) in [
            ("/api/dcim/sites/", 10),
            ("/api/dcim/device-roles/", 20),
            ("/api/dcim/device-types/", 30),
            ("/api/dcim/manufacturers/", 40),
            ("/api/dcim/platforms/", 50),
        ] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
                .mount(server)
                .await;
            Mock::given(method("POST"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": id})))
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/api/dcim/devices/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .mount(server)
            .await;
    }

    fn device(name: &str) -> NetboxDevice {
        NetboxDevice {
            name: name.to_string(),
            status: "alive".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_status_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status/"))
            .and(header("authorization", "Token secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"netbox-version": "3.7"})))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server).check_status().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_failure_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status/"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Invalid token"))
            .mount(&server)
            .await;

        let err = test_client(&server).check_status().await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteCall { status: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_tags_created_once_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/extras/tags/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/extras/tags/"))
            .and(body_partial_json(json!({"name": "Discovered", "slug": "discovered", "color": "c0c0c0"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/extras/tags/"))
            .and(body_partial_json(json!({"name": "Placeholder", "slug": "placeholder", "color": "ff6600"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2})))
            .expect(1)
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        client.create_device(&device("sw1")).await.unwrap();
        client.create_device(&device("sw2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_placeholder_manufacturer_created_once() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/manufacturers/"))
            .and(body_partial_json(json!({"name": "Unknown", "slug": "unknown"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 40})))
            .expect(1)
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .expect(2)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        client.create_device(&device("sw1")).await.unwrap();
        client.create_device(&device("sw2")).await.unwrap();

        let cached = client.placeholders();
        assert_eq!(cached.manufacturer, Some(40));
        assert_eq!(cached.site, Some(10));
        assert_eq!(cached.role, Some(20));
        assert_eq!(cached.device_type, Some(30));
        assert_eq!(cached.platform, Some(50));
    }

    #[tokio::test]
    async fn test_placeholders_carry_both_tags() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/sites/"))
            .and(body_partial_json(json!({
                "name": "Unknown",
                "status": "staging",
                "tags": [{"name": "Placeholder", "slug": "placeholder"}, {"name": "Discovered", "slug": "discovered"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 11})))
            .expect(1)
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .and(body_partial_json(json!({
                "name": "sw1",
                "site": 11,
                "status": "active",
                "tags": [{"name": "Discovered", "slug": "discovered"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        assert_eq!(client.create_device(&device("sw1")).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_named_taxonomy_lookup_first_match_wins() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/sites/"))
            .and(query_param("slug", "head-office"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[7, 8])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/sites/"))
            .and(body_partial_json(json!({"slug": "head-office"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 99})))
            .expect(0)
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .and(body_partial_json(json!({"site": 7})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let mut d = device("sw1");
        d.site = NamedObject::named("Head Office");
        client.create_device(&d).await.unwrap();
        assert_eq!(client.placeholders().site, None);
    }

    #[tokio::test]
    async fn test_named_device_type_resolves_manufacturer() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/manufacturers/"))
            .and(body_partial_json(json!({"name": "Arista", "slug": "arista"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 41})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/device-types/"))
            .and(body_partial_json(json!({"model": "vEOS", "slug": "veos", "manufacturer": 41})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 31})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/platforms/"))
            .and(body_partial_json(json!({"name": "eos", "manufacturer": 41})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 51})))
            .expect(1)
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .and(body_partial_json(json!({"device_type": 31, "platform": 51})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let mut d = device("sw1");
        d.device_type = Some(DeviceTypeRef { model: "vEOS".to_string(), manufacturer: NamedObject::named("Arista") });
        d.platform = Some(PlatformRef { name: "eos".to_string(), manufacturer: NamedObject::named("Arista") });
        client.create_device(&d).await.unwrap();
        assert_eq!(client.placeholders().manufacturer, None);
    }

    #[tokio::test]
    async fn test_existing_device_is_not_recreated() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/devices/"))
            .and(query_param("name", "sw1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[77])))
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 100})))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        assert_eq!(client.create_device(&device("sw1")).await.unwrap(), 77);
    }

    #[tokio::test]
    async fn test_duplicate_taxonomy_surfaces() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/sites/"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"slug": ["site with this slug already exists."]})),
            )
            .mount(&server)
            .await;
        mount_empty_taxonomy(&server).await;

        let mut client = test_client(&server);
        let err = client.create_device(&device("sw1")).await.unwrap_err();
        assert!(matches!(err, SyncError::DuplicateTaxonomy { kind: "site", .. }));
        assert_eq!(client.placeholders().site, None);
    }

    #[tokio::test]
    async fn test_failure_keeps_cached_ids() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        mount_empty_taxonomy(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/devices/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let err = client.create_device(&device("sw1")).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteCall { status: Some(500), .. }));
        assert_eq!(client.placeholders().manufacturer, Some(40));
        assert_eq!(client.placeholders().site, Some(10));
    }

    #[tokio::test]
    async fn test_interface_body_mapping() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/interfaces/"))
            .and(query_param("device_id", "42"))
            .and(query_param("name", "eth0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/interfaces/"))
            .and(body_partial_json(json!({
                "device": 42,
                "name": "eth0",
                "type": "other",
                "description": "ethernet",
                "mtu": 1500,
                "enabled": true,
                "mac_address": "00:11:22:33:44:55"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 500})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let id = client
            .create_interface(&NetboxInterface {
                device_id: 42,
                name: "eth0".to_string(),
                if_type: "ethernet".to_string(),
                speed: INTERFACE_SPEED_MAX,
                mtu: 1500,
                mac_address: "00:11:22:33:44:55".to_string(),
                state: "up".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(id, 500);

        let received = server.received_requests().await.unwrap();
        let post = received
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .unwrap();
        let body: Value = serde_json::from_slice(&post.body).unwrap();
        assert!(body.get("speed").is_none(), "Out of range speed must be omitted");
    }

    #[tokio::test]
    async fn test_assign_primary_ip_patches_device() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .and(query_param("device_id", "42"))
            .and(query_param("address", "10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[600])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/dcim/devices/42/"))
            .and(body_partial_json(json!({"primary_ip4": 600})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        assert!(client.assign_primary_ip(42, "10.0.0.1".parse().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_client_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let config = NetboxConfig { endpoint: server.uri(), token: "secret".to_string() };
        let client = NetboxClient::new(&config, cancel.clone()).unwrap();
        cancel.cancel();

        assert!(matches!(client.check_status().await, Err(SyncError::Cancelled)));
    }

    fn vlan10() -> NetboxVlan {
        NetboxVlan { vid: 10, name: "Vlan10".to_string(), status: "deprecated".to_string() }
    }

    fn psu(manufacturer: Option<NamedObject>) -> NetboxInventoryItem {
        NetboxInventoryItem {
            device_id: 42,
            name: "PSU1".to_string(),
            manufacturer,
            part_id: "PWR-500".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_vlan_found_by_lookup_is_not_created() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/ipam/vlans/"))
            .and(query_param("vid", "10"))
            .and(query_param("name", "Vlan10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[900])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/ipam/vlans/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 901})))
            .expect(0)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        assert_eq!(client.create_vlan(&vlan10()).await.unwrap(), 900);
    }

    #[tokio::test]
    async fn test_missing_vlan_is_created_with_status() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/ipam/vlans/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/ipam/vlans/"))
            .and(body_partial_json(json!({"vid": 10, "name": "Vlan10", "status": "deprecated"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 901})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        assert_eq!(client.create_vlan(&vlan10()).await.unwrap(), 901);
    }

    #[tokio::test]
    async fn test_inventory_item_vendor_resolves_manufacturer() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/inventory-items/"))
            .and(query_param("device_id", "42"))
            .and(query_param("name", "PSU1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/manufacturers/"))
            .and(query_param("slug", "arista"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/manufacturers/"))
            .and(body_partial_json(json!({"name": "Arista", "slug": "arista"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 41})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/inventory-items/"))
            .and(body_partial_json(json!({"device": 42, "name": "PSU1", "part_id": "PWR-500", "manufacturer": 41})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 700})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let id = client.create_inventory_item(&psu(NamedObject::named("Arista"))).await.unwrap();
        assert_eq!(id, 700);
    }

    #[tokio::test]
    async fn test_inventory_item_without_vendor_omits_manufacturer() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/dcim/inventory-items/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&[])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/manufacturers/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 41})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dcim/inventory-items/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 700})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = test_client(&server);
        let id = client.create_inventory_item(&psu(NamedObject::named(""))).await.unwrap();
        assert_eq!(id, 700);

        let requests = server.received_requests().await.unwrap();
        let post = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && r.url.path() == "/api/dcim/inventory-items/")
            .unwrap();
        let body: Value = serde_json::from_slice(&post.body).unwrap();
        assert!(body.get("manufacturer").is_none());
        assert_eq!(body["device"], json!(42));
    }
}
