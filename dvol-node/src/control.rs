//! Agent side of the control service REST surface.

use std::time::Duration;

use dvol_types::{NodeManifest, NodeStateReport};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{AgentError, Result};

#[derive(Deserialize)]
struct ReportStateResponse {
    accepted: bool,
}

/// HTTP client for the agent endpoints of one node.
#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    node: String,
    http: Client,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            node: node.into(),
            http: Client::new(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// `{base}/v1/agents/<node>/<suffix>` with the node id percent-encoded.
    fn url(&self, suffix: &str) -> Result<Url> {
        let invalid = |reason: String| AgentError::InvalidEndpoint {
            base_url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "agents", self.node.as_str(), suffix]);
        Ok(url)
    }

    /// Fetch the manifest. With `after_version` set the service holds the
    /// request for up to `wait` until the configuration moves past it.
    pub async fn manifest(
        &self,
        after_version: Option<u64>,
        wait: Duration,
    ) -> Result<NodeManifest> {
        let mut request = self.http.get(self.url("manifest")?);
        if let Some(after) = after_version {
            request = request
                .query(&[("after_version", after), ("wait_ms", wait.as_millis() as u64)])
                .timeout(wait + Duration::from_secs(5));
        }
        decode(request.send().await?).await
    }

    /// Push a full snapshot; returns whether the service accepted it.
    pub async fn report(&self, report: &NodeStateReport) -> Result<bool> {
        let response = self
            .http
            .post(self.url("state")?)
            .json(report)
            .send()
            .await?;
        let body: ReportStateResponse = decode(response).await?;
        Ok(body.accepted)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(AgentError::UnexpectedResponse {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}
