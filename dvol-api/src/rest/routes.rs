use axum::{
    Json, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{self, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "dvol Control Service",
        version = "0.1.0",
        description = "REST API for the dvol control service. Accepts changes to the desired dataset and container configuration and exposes the state observed by node agents.",
        license(name = "MIT")
    ),
    tags(
        (name = "system", description = "System information"),
        (name = "datasets", description = "Desired dataset configuration"),
        (name = "containers", description = "Desired container configuration"),
        (name = "state", description = "Observed cluster state"),
        (name = "agents", description = "Node agent manifests and state reports")
    ),
    paths(
        handlers::get_version,
        handlers::list_datasets,
        handlers::create_dataset,
        handlers::move_dataset,
        handlers::delete_dataset,
        handlers::list_containers,
        handlers::create_container,
        handlers::delete_container,
        handlers::list_dataset_state,
        handlers::list_container_state,
        handlers::list_nodes,
        handlers::get_manifest,
        handlers::report_state,
    ),
    components(schemas(
        handlers::VersionInfo,
        handlers::ApiError,
        handlers::CreateDatasetRequest,
        handlers::MoveDatasetRequest,
        handlers::CreateContainerRequest,
        handlers::ReportStateResponse,
        dvol_types::ErrorKind,
        dvol_types::Dataset,
        dvol_types::Container,
        dvol_types::DatasetState,
        dvol_types::DatasetStatus,
        dvol_types::ContainerState,
        dvol_types::NodeInfo,
        dvol_types::NodeManifest,
        dvol_types::NodeStateReport,
        dvol_types::ObservedDataset,
        dvol_types::ObservedContainer,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        // System
        .route("/version", get(handlers::get_version))
        .route("/openapi.json", get(openapi_json))
        // Configuration
        .route(
            "/datasets",
            get(handlers::list_datasets).post(handlers::create_dataset),
        )
        .route(
            "/datasets/{dataset_id}",
            post(handlers::move_dataset).delete(handlers::delete_dataset),
        )
        .route(
            "/containers",
            get(handlers::list_containers).post(handlers::create_container),
        )
        .route(
            "/containers/{name}",
            axum::routing::delete(handlers::delete_container),
        )
        // Observed state
        .route("/state/datasets", get(handlers::list_dataset_state))
        .route("/state/containers", get(handlers::list_container_state))
        .route("/state/nodes", get(handlers::list_nodes))
        // Node agents
        .route("/agents/{node}/manifest", get(handlers::get_manifest))
        .route("/agents/{node}/state", post(handlers::report_state));

    Router::new()
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
