mod agents;
mod containers;
mod datasets;
mod state;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::{Json, http::HeaderMap, http::StatusCode, response::IntoResponse};
use dvol_types::ErrorKind;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::store::{Committed, DataStore, StoreError};

pub use agents::*;
pub use containers::*;
pub use datasets::*;
pub use state::*;

/// Header carrying a client-chosen idempotency key for mutations.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying the configuration version a mutation was committed at.
pub const VERSION_HEADER: &str = "x-configuration-version";

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn DataStore>,
}

/// API error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: ErrorKind,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.code.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let code = e.kind();
        let error = match e {
            StoreError::NotFound(msg)
            | StoreError::Conflict(msg)
            | StoreError::Precondition(msg)
            | StoreError::Invalid(msg)
            | StoreError::Storage(msg)
            | StoreError::Internal(msg) => msg,
            StoreError::VersionMismatch { expected, actual } => {
                format!("Version mismatch: expected {}, got {}", expected, actual)
            }
        };
        ApiError { error, code }
    }
}

fn bad_request(error: String) -> ApiError {
    ApiError {
        error,
        code: ErrorKind::BadRequest,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

/// JSON request body; malformed bodies are answered with a `bad_request` [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; unparsable segments are answered with a `bad_request` [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string; unparsable parameters are answered with a `bad_request` [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Mutation response: the resource document plus its committed version header.
pub type Versioned<T> = ([(&'static str, String); 1], Json<T>);

fn versioned<T>(committed: Committed<T>) -> Versioned<T> {
    (
        [(VERSION_HEADER, committed.version.to_string())],
        Json(committed.value),
    )
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Version information
#[derive(Serialize, ToSchema)]
pub struct VersionInfo {
    pub version: String,
}

/// Get service version
#[utoipa::path(
    get,
    path = "/v1/version",
    responses(
        (status = 200, description = "Service version", body = VersionInfo)
    ),
    tag = "system"
)]
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
