use axum::{Json, extract::State};
use dvol_types::{ContainerState, DatasetState, NodeInfo};
use std::sync::Arc;

use super::{ApiError, AppState};

/// List observed dataset state
///
/// Returns the latest snapshot reported by the nodes; it may lag the
/// configuration.
#[utoipa::path(
    get,
    path = "/v1/state/datasets",
    responses(
        (status = 200, description = "Observed datasets", body = Vec<DatasetState>)
    ),
    tag = "state"
)]
pub async fn list_dataset_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DatasetState>>, ApiError> {
    Ok(Json(state.store.list_dataset_state().await?))
}

/// List observed container state
#[utoipa::path(
    get,
    path = "/v1/state/containers",
    responses(
        (status = 200, description = "Observed containers", body = Vec<ContainerState>)
    ),
    tag = "state"
)]
pub async fn list_container_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContainerState>>, ApiError> {
    Ok(Json(state.store.list_container_state().await?))
}

/// List known nodes
#[utoipa::path(
    get,
    path = "/v1/state/nodes",
    responses(
        (status = 200, description = "Known nodes", body = Vec<NodeInfo>)
    ),
    tag = "state"
)]
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NodeInfo>>, ApiError> {
    Ok(Json(state.store.list_nodes().await?))
}
