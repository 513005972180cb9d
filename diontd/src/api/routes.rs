use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diont::{Diont, DiontConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use shared::protocol::API_PREFIX;
use shared::types::{ServiceId, ServiceInfo};
use crate::view::history::{EventHistory, RecordedEvent};

#[derive(Clone)]
pub struct AppState {
    pub diont: Diont,
    pub hash_rx: watch::Receiver<String>,
    pub history: Arc<RwLock<EventHistory>>,
    pub network: Arc<DiontConfig>,
    pub node: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub node: String,
    pub destination: String,
    pub port: u16,
    pub broadcast: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ServiceQuery {
    pub own: Option<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/config", API_PREFIX), get(get_config))
        .route(&format!("{}/services", API_PREFIX), get(get_services))
        .route(&format!("{}/services/hash", API_PREFIX), get(get_hash))
        .route(&format!("{}/services/:id", API_PREFIX), get(get_service))
        .route(&format!("{}/events", API_PREFIX), get(get_events))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        node: state.node.clone(),
        destination: state.network.destination().to_string(),
        port: state.network.port,
        broadcast: state.network.broadcast,
        started_at: state.started_at,
    })
}

async fn get_services(
    State(state): State<AppState>,
    Query(params): Query<ServiceQuery>,
) -> Result<Json<Vec<ServiceInfo>>, StatusCode> {
    let mut services = state.diont.service_infos().await.map_err(|e| {
        tracing::error!("Failed to query services: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    if let Some(own) = params.own {
        services.retain(|info| info.is_our_service == own);
    }
    services.sort_by_key(|info| info.id());

    Ok(Json(services))
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceInfo>, StatusCode> {
    let id = ServiceId::from(id);
    state
        .diont
        .service_infos()
        .await
        .map_err(|e| {
            tracing::error!("Failed to query service: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?
        .into_iter()
        .find(|info| info.id() == id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_events(State(state): State<AppState>) -> Json<Vec<RecordedEvent>> {
    Json(state.history.read().await.to_vec())
}
