use axum::{Json, extract::State, http::HeaderMap};
use dvol_types::Dataset;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{
    CreateDatasetRequest as StoreCreateDatasetRequest, DeleteDatasetRequest,
    MoveDatasetRequest as StoreMoveDatasetRequest,
};

use super::{ApiError, ApiJson, ApiPath, ApiQuery, AppState, Versioned, request_id, versioned};

/// Request to create a dataset
#[derive(Deserialize, ToSchema)]
pub struct CreateDatasetRequest {
    /// Node that should own the dataset
    pub primary: String,
    /// Dataset UUID; generated by the server when omitted
    pub dataset_id: Option<Uuid>,
    /// Arbitrary string metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Optional size limit in bytes
    pub maximum_size: Option<u64>,
}

/// Request to move a dataset to another node
#[derive(Deserialize, ToSchema)]
pub struct MoveDatasetRequest {
    /// New primary node
    pub primary: String,
    /// Fail with 409 unless the dataset is still at this version
    pub expected_version: Option<u64>,
}

/// Query parameters for delete dataset
#[derive(Deserialize, ToSchema)]
pub struct DeleteDatasetQuery {
    pub expected_version: Option<u64>,
}

/// List datasets in the desired configuration
#[utoipa::path(
    get,
    path = "/v1/datasets",
    responses(
        (status = 200, description = "Configured datasets", body = Vec<Dataset>)
    ),
    tag = "datasets"
)]
pub async fn list_datasets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Dataset>>, ApiError> {
    Ok(Json(state.store.list_datasets().await?))
}

/// Create a dataset on a specific node
#[utoipa::path(
    post,
    path = "/v1/datasets",
    request_body = CreateDatasetRequest,
    responses(
        (status = 200, description = "Dataset created", body = Dataset),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 409, description = "Dataset ID already exists", body = ApiError)
    ),
    tag = "datasets"
)]
pub async fn create_dataset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateDatasetRequest>,
) -> Result<Versioned<Dataset>, ApiError> {
    let store_req = StoreCreateDatasetRequest {
        request_id: request_id(&headers),
        primary: req.primary,
        dataset_id: req.dataset_id,
        metadata: req.metadata,
        maximum_size: req.maximum_size,
    };

    let committed = state.store.create_dataset(store_req).await?;
    Ok(versioned(committed))
}

/// Move a dataset to a new primary node
#[utoipa::path(
    post,
    path = "/v1/datasets/{dataset_id}",
    params(
        ("dataset_id" = Uuid, Path, description = "Dataset ID")
    ),
    request_body = MoveDatasetRequest,
    responses(
        (status = 200, description = "Dataset moved", body = Dataset),
        (status = 404, description = "Dataset not found", body = ApiError),
        (status = 409, description = "Stale expected_version or dataset used by a container", body = ApiError)
    ),
    tag = "datasets"
)]
pub async fn move_dataset(
    State(state): State<Arc<AppState>>,
    ApiPath(dataset_id): ApiPath<Uuid>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<MoveDatasetRequest>,
) -> Result<Versioned<Dataset>, ApiError> {
    let store_req = StoreMoveDatasetRequest {
        request_id: request_id(&headers),
        primary: req.primary,
        expected_version: req.expected_version,
    };

    let committed = state.store.move_dataset(dataset_id, store_req).await?;
    Ok(versioned(committed))
}

/// Delete a dataset
///
/// The dataset is removed from the configuration immediately; nodes release
/// it on their next convergence pass.
#[utoipa::path(
    delete,
    path = "/v1/datasets/{dataset_id}",
    params(
        ("dataset_id" = Uuid, Path, description = "Dataset ID"),
        ("expected_version" = Option<u64>, Query, description = "Fail with 409 unless the dataset is still at this version")
    ),
    responses(
        (status = 200, description = "Dataset deleted", body = Dataset),
        (status = 404, description = "Dataset not found", body = ApiError),
        (status = 409, description = "Stale expected_version or dataset used by a container", body = ApiError)
    ),
    tag = "datasets"
)]
pub async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    ApiPath(dataset_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DeleteDatasetQuery>,
    headers: HeaderMap,
) -> Result<Versioned<Dataset>, ApiError> {
    let store_req = DeleteDatasetRequest {
        request_id: request_id(&headers),
        expected_version: query.expected_version,
    };

    let committed = state.store.delete_dataset(dataset_id, store_req).await?;
    Ok(versioned(committed))
}
