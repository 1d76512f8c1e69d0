use axum::{Json, extract::State};
use dvol_types::{NodeManifest, NodeStateReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

use super::{ApiError, ApiJson, ApiPath, ApiQuery, AppState};

/// Upper bound for a long-polling manifest request.
const MAX_MANIFEST_WAIT: Duration = Duration::from_secs(30);

/// Query parameters for get manifest
#[derive(Deserialize, ToSchema)]
pub struct ManifestQuery {
    /// Configuration version the agent already applied
    pub after_version: Option<u64>,
    /// How long to wait for a newer configuration, in milliseconds
    pub wait_ms: Option<u64>,
}

/// Result of a state report
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReportStateResponse {
    /// False if the report's epoch was not newer than the last accepted one
    pub accepted: bool,
}

/// Get the desired resources for a node
///
/// With `after_version` and `wait_ms` the request waits until the
/// configuration moves past `after_version` or the wait expires.
#[utoipa::path(
    get,
    path = "/v1/agents/{node}/manifest",
    params(
        ("node" = String, Path, description = "Node ID"),
        ("after_version" = Option<u64>, Query, description = "Last applied configuration version"),
        ("wait_ms" = Option<u64>, Query, description = "Long-poll timeout in milliseconds")
    ),
    responses(
        (status = 200, description = "Node manifest", body = NodeManifest)
    ),
    tag = "agents"
)]
pub async fn get_manifest(
    State(state): State<Arc<AppState>>,
    ApiPath(node): ApiPath<String>,
    ApiQuery(query): ApiQuery<ManifestQuery>,
) -> Result<Json<NodeManifest>, ApiError> {
    // Subscribe before reading so a change in between is not missed
    let mut events = state.store.subscribe();
    let manifest = state.store.manifest_for(&node).await?;

    let (Some(after), Some(wait_ms)) = (query.after_version, query.wait_ms) else {
        return Ok(Json(manifest));
    };
    if manifest.version > after {
        return Ok(Json(manifest));
    }

    let wait = Duration::from_millis(wait_ms).min(MAX_MANIFEST_WAIT);
    let changed = tokio::time::timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(event) if event.configuration_version().is_some_and(|v| v > after) => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => break,
            }
        }
    })
    .await;

    if changed.is_err() {
        return Ok(Json(manifest));
    }
    Ok(Json(state.store.manifest_for(&node).await?))
}

/// Report the observed state of a node
#[utoipa::path(
    post,
    path = "/v1/agents/{node}/state",
    params(
        ("node" = String, Path, description = "Node ID")
    ),
    request_body = NodeStateReport,
    responses(
        (status = 200, description = "Report processed", body = ReportStateResponse)
    ),
    tag = "agents"
)]
pub async fn report_state(
    State(state): State<Arc<AppState>>,
    ApiPath(node): ApiPath<String>,
    ApiJson(report): ApiJson<NodeStateReport>,
) -> Result<Json<ReportStateResponse>, ApiError> {
    let accepted = state.store.report_state(&node, report).await?;
    Ok(Json(ReportStateResponse { accepted }))
}
