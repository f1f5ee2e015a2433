use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use shared::protocol::API_PREFIX;
use shared::types::{Device, Interface, InventoryItem, Vlan};
use crate::error::SyncError;
use crate::store::db::PendingCounts;
use crate::store_manager::StoreHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub ingest_tx: mpsc::Sender<Vec<u8>>,
}

#[derive(Deserialize)]
pub struct DeviceQuery {
    pub policy: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Deserialize)]
pub struct HostQuery {
    pub policy: String,
    #[serde(default)]
    pub namespace: String,
    pub hostname: String,
}

/// Child records of one device, or of the whole namespace when `hostname`
/// is absent
#[derive(Deserialize)]
pub struct ChildQuery {
    pub policy: String,
    #[serde(default)]
    pub namespace: String,
    pub hostname: Option<String>,
}

#[derive(Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// Every stored record sharing a display name
#[derive(Serialize)]
pub struct SearchResponse {
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub vlans: Vec<Vlan>,
    pub inventory: Vec<InventoryItem>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/ingest", API_PREFIX), post(ingest))
        .route(&format!("{}/devices", API_PREFIX), get(get_devices))
        .route(&format!("{}/devices/lookup", API_PREFIX), get(lookup_device))
        .route(&format!("{}/interfaces", API_PREFIX), get(get_interfaces))
        .route(&format!("{}/vlans", API_PREFIX), get(get_vlans))
        .route(&format!("{}/inventory", API_PREFIX), get(get_inventory))
        .route(&format!("{}/search", API_PREFIX), get(search))
        .route(&format!("{}/pending", API_PREFIX), get(get_pending))
        .with_state(state)
}

fn internal(e: SyncError) -> StatusCode {
    tracing::error!(error = %e, "Store query failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn ingest(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match state.ingest_tx.send(body.to_vec()).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            tracing::warn!("Ingest consumer is gone, rejecting payload");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn get_devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceQuery>,
) -> Result<Json<Vec<Device>>, StatusCode> {
    state
        .store
        .get_devices(params.policy, params.namespace)
        .await
        .map(Json)
        .map_err(internal)
}

async fn lookup_device(
    State(state): State<AppState>,
    Query(params): Query<HostQuery>,
) -> Result<Json<Device>, StatusCode> {
    match state
        .store
        .get_device(params.policy, params.namespace, params.hostname)
        .await
    {
        Ok(device) => Ok(Json(device)),
        Err(SyncError::NotFound { .. }) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal(e)),
    }
}

async fn get_interfaces(
    State(state): State<AppState>,
    Query(params): Query<ChildQuery>,
) -> Result<Json<Vec<Interface>>, StatusCode> {
    let result = match params.hostname {
        Some(hostname) => state.store.get_interfaces(params.policy, params.namespace, hostname).await,
        None => state.store.get_interfaces_in_namespace(params.policy, params.namespace).await,
    };
    result.map(Json).map_err(internal)
}

async fn get_vlans(
    State(state): State<AppState>,
    Query(params): Query<ChildQuery>,
) -> Result<Json<Vec<Vlan>>, StatusCode> {
    let result = match params.hostname {
        Some(hostname) => state.store.get_vlans(params.policy, params.namespace, hostname).await,
        None => state.store.get_vlans_in_namespace(params.policy, params.namespace).await,
    };
    result.map(Json).map_err(internal)
}

async fn get_inventory(
    State(state): State<AppState>,
    Query(params): Query<ChildQuery>,
) -> Result<Json<Vec<InventoryItem>>, StatusCode> {
    let result = match params.hostname {
        Some(hostname) => state.store.get_inventory(params.policy, params.namespace, hostname).await,
        None => state.store.get_inventory_in_namespace(params.policy, params.namespace).await,
    };
    result.map(Json).map_err(internal)
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<NameQuery>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let store = &state.store;
    let name = params.name;
    Ok(Json(SearchResponse {
        devices: store.get_devices_by_name(name.clone()).await.map_err(internal)?,
        interfaces: store.get_interfaces_by_name(name.clone()).await.map_err(internal)?,
        vlans: store.get_vlans_by_name(name.clone()).await.map_err(internal)?,
        inventory: store.get_inventory_by_name(name).await.map_err(internal)?,
    }))
}

async fn get_pending(State(state): State<AppState>) -> Result<Json<PendingCounts>, StatusCode> {
    state.store.pending_counts().await.map(Json).map_err(internal)
}
