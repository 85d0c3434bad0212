//! HTTP routes.

use crate::error::ApiError;
use crate::request::{CredentialCreate, FromBody, InstanceCreate};
use crate::store::ApiStore;
use crate::validation::{is_valid_action, is_valid_name};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use crds::{ActionType, Credential, VirtualMachine};
use k8s_openapi::api::core::v1::Node;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ApiStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ApiStore>) -> Self {
        Self { store }
    }
}

/// List responses are wrapped as `{"data": [...]}`.
#[derive(Debug, Serialize)]
pub struct DataList<T> {
    pub data: Vec<T>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/instances", get(list_instances).post(create_instance))
        .route("/v1/instances/{name}", delete(delete_instance))
        .route("/v1/instances/{name}/{action}", post(instance_action))
        .route("/v1/credential", get(list_credentials).post(create_credential))
        .route("/v1/credential/{name}", delete(delete_credential))
        .route("/v1/host", get(list_hosts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_instances(State(state): State<AppState>) -> Result<Json<DataList<VirtualMachine>>, ApiError> {
    let data = state.store.list_instances().await?;
    Ok(Json(DataList { data }))
}

async fn create_instance(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request = InstanceCreate::from_body(&headers, &body)?;
    request.validate()?;
    let vm = state.store.create_instance(&request.into_vm()).await?;
    info!("Created VirtualMachine {}", vm.metadata.name.as_deref().unwrap_or_default());
    Ok(StatusCode::CREATED)
}

async fn delete_instance(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    if !is_valid_name(&name) {
        return Err(ApiError::bad_request("invalid name"));
    }
    state.store.delete_instance(&name).await?;
    info!("Deleted VirtualMachine {}", name);
    Ok(StatusCode::NO_CONTENT)
}

/// Sets `spec.action`. 304 when the VM already has that action.
async fn instance_action(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let action = ActionType::from(action);
    if !is_valid_name(&name) || !is_valid_action(&action) {
        return Err(ApiError::bad_request("invalid name or action"));
    }

    let mut vm = state.store.get_instance(&name).await?;
    if vm.spec.action == action {
        return Ok(StatusCode::NOT_MODIFIED);
    }
    vm.spec.action = action;
    state.store.replace_instance(&vm).await?;
    info!("VirtualMachine {} action set to {}", name, vm.spec.action);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_credentials(State(state): State<AppState>) -> Result<Json<DataList<Credential>>, ApiError> {
    let data = state.store.list_credentials().await?;
    Ok(Json(DataList { data }))
}

async fn create_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request = CredentialCreate::from_body(&headers, &body)?;
    request.validate()?;
    state.store.create_credential(&request.into_credential()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_credential(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
    if !is_valid_name(&name) {
        return Err(ApiError::bad_request("invalid name"));
    }
    state.store.delete_credential(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_hosts(State(state): State<AppState>) -> Result<Json<DataList<Node>>, ApiError> {
    let data = state.store.list_hosts().await?;
    Ok(Json(DataList { data }))
}
