//! REST client for a running control service.

use async_trait::async_trait;
use dvol_types::{Container, ContainerState, Dataset, DatasetState, ErrorKind, NodeInfo};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::client::{ClusterClient, CreateDatasetRequest, Versioned};
use crate::error::{ClientError, Result};

const VERSION_HEADER: &str = "x-configuration-version";

#[derive(Serialize)]
struct CreateDatasetBody<'a> {
    primary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_id: Option<Uuid>,
    metadata: &'a std::collections::BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maximum_size: Option<u64>,
}

#[derive(Serialize)]
struct MoveDatasetBody<'a> {
    primary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version: Option<u64>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
    code: ErrorKind,
}

/// [`ClusterClient`] over the version 1 REST surface.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    http: Client,
}

impl HttpClient {
    /// `base_url` is the service root, e.g. `http://10.0.0.1:4523`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/<segments>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |reason: String| ClientError::InvalidEndpoint {
            base_url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    /// Move a dataset, failing with `ConcurrentModification` unless it is
    /// still at `expected_version`.
    pub async fn move_dataset_expecting(
        &self,
        dataset_id: Uuid,
        primary: &str,
        expected_version: Option<u64>,
    ) -> Result<Versioned<Dataset>> {
        let request = self
            .http
            .post(self.url(&["datasets", &dataset_id.to_string()])?)
            .json(&MoveDatasetBody {
                primary,
                expected_version,
            });
        send(request).await
    }

    /// Delete a dataset, failing with `ConcurrentModification` unless it is
    /// still at `expected_version`.
    pub async fn delete_dataset_expecting(
        &self,
        dataset_id: Uuid,
        expected_version: Option<u64>,
    ) -> Result<Versioned<Dataset>> {
        let mut request = self
            .http
            .delete(self.url(&["datasets", &dataset_id.to_string()])?);
        if let Some(version) = expected_version {
            request = request.query(&[("expected_version", version)]);
        }
        send(request).await
    }

    /// Create a dataset and report the configuration version it landed at.
    pub async fn create_dataset_versioned(
        &self,
        req: &CreateDatasetRequest,
    ) -> Result<Versioned<Dataset>> {
        let request = self.http.post(self.url(&["datasets"])?).json(&CreateDatasetBody {
            primary: &req.primary,
            dataset_id: req.dataset_id,
            metadata: &req.metadata,
            maximum_size: req.maximum_size,
        });
        send(request).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        Ok(send(self.http.get(self.url(segments)?)).await?.value)
    }
}

/// Send a request and decode either the document or the typed error.
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<Versioned<T>> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let value = response.json::<T>().await?;
        return Ok(Versioned { value, version });
    }

    let body = response.text().await?;
    debug!("Request failed with {}: {}", status, body);
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => Err(ClientError::from_api(status.as_u16(), err.code, err.error)),
        Err(_) => Err(ClientError::UnexpectedResponse {
            status: status.as_u16(),
            message: body,
        }),
    }
}

#[async_trait]
impl ClusterClient for HttpClient {
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset> {
        Ok(self.create_dataset_versioned(&req).await?.value)
    }

    async fn move_dataset(&self, dataset_id: Uuid, primary: &str) -> Result<Dataset> {
        Ok(self
            .move_dataset_expecting(dataset_id, primary, None)
            .await?
            .value)
    }

    async fn delete_dataset(&self, dataset_id: Uuid) -> Result<Dataset> {
        Ok(self.delete_dataset_expecting(dataset_id, None).await?.value)
    }

    async fn create_container(&self, container: Container) -> Result<Container> {
        let request = self.http.post(self.url(&["containers"])?).json(&container);
        Ok(send(request).await?.value)
    }

    async fn delete_container(&self, name: &str) -> Result<Container> {
        let request = self.http.delete(self.url(&["containers", name])?);
        Ok(send(request).await?.value)
    }

    async fn list_datasets_configuration(&self) -> Result<Vec<Dataset>> {
        self.get(&["datasets"]).await
    }

    async fn list_dataset_state(&self) -> Result<Vec<DatasetState>> {
        self.get(&["state", "datasets"]).await
    }

    async fn list_containers_configuration(&self) -> Result<Vec<Container>> {
        self.get(&["containers"]).await
    }

    async fn list_container_state(&self) -> Result<Vec<ContainerState>> {
        self.get(&["state", "containers"]).await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        self.get(&["state", "nodes"]).await
    }
}
