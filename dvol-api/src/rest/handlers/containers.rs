use axum::{Json, extract::State, http::HeaderMap};
use dvol_types::Container;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{
    CreateContainerRequest as StoreCreateContainerRequest, DeleteContainerRequest,
};

use super::{ApiError, ApiJson, ApiPath, AppState, Versioned, request_id, versioned};

/// Request to create a container
#[derive(Deserialize, ToSchema)]
pub struct CreateContainerRequest {
    /// Unique container name
    pub name: String,
    /// Node the container runs on
    pub node: String,
    /// Datasets mounted by the container
    #[serde(default)]
    pub dataset_ids: Vec<Uuid>,
}

/// List containers in the desired configuration
#[utoipa::path(
    get,
    path = "/v1/containers",
    responses(
        (status = 200, description = "Configured containers", body = Vec<Container>)
    ),
    tag = "containers"
)]
pub async fn list_containers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Container>>, ApiError> {
    Ok(Json(state.store.list_containers().await?))
}

/// Create a container
#[utoipa::path(
    post,
    path = "/v1/containers",
    request_body = CreateContainerRequest,
    responses(
        (status = 200, description = "Container created", body = Container),
        (status = 404, description = "Referenced dataset not found", body = ApiError),
        (status = 409, description = "Name taken or dataset on another node", body = ApiError)
    ),
    tag = "containers"
)]
pub async fn create_container(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateContainerRequest>,
) -> Result<Versioned<Container>, ApiError> {
    let store_req = StoreCreateContainerRequest {
        request_id: request_id(&headers),
        name: req.name,
        node: req.node,
        dataset_ids: req.dataset_ids,
    };

    let committed = state.store.create_container(store_req).await?;
    Ok(versioned(committed))
}

/// Delete a container by name
#[utoipa::path(
    delete,
    path = "/v1/containers/{name}",
    params(
        ("name" = String, Path, description = "Container name")
    ),
    responses(
        (status = 200, description = "Container deleted", body = Container),
        (status = 404, description = "Container not found", body = ApiError)
    ),
    tag = "containers"
)]
pub async fn delete_container(
    State(state): State<Arc<AppState>>,
    ApiPath(name): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Versioned<Container>, ApiError> {
    let store_req = DeleteContainerRequest {
        request_id: request_id(&headers),
    };

    let committed = state.store.delete_container(&name, store_req).await?;
    Ok(versioned(committed))
}
