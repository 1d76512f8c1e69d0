//! Shared test utilities for dvol-api integration tests.

#![allow(dead_code)]

use dvol_api::rest::{AppState, create_router};
use dvol_api::{ControlStore, DataStore};
use dvol_client::HttpClient;
use dvol_types::{DatasetStatus, NodeStateReport, ObservedDataset};
use reqwest::{Client, Response as ReqwestResponse};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

/// Allocate an available port for testing.
pub fn allocate_port() -> u16 {
    portpicker::pick_unused_port().expect("No available port")
}

/// Control service running in-process on a loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<ControlStore>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn a control service with in-memory storage.
    pub async fn spawn() -> Self {
        Self::spawn_with_store(Arc::new(ControlStore::in_memory())).await
    }

    pub async fn spawn_with_store(store: Arc<ControlStore>) -> Self {
        let app_state = Arc::new(AppState {
            store: store.clone() as Arc<dyn DataStore>,
        });
        let router = create_router(app_state);

        let addr: SocketAddr = format!("127.0.0.1:{}", allocate_port()).parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        // Small delay to ensure server is ready
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self {
            addr: actual_addr,
            client: Client::new(),
            store,
            shutdown_tx,
        }
    }

    /// Service root, as passed to agents and clients.
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL for the REST API.
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.root_url())
    }

    /// Typed client against this server.
    pub fn http_client(&self) -> HttpClient {
        HttpClient::with_client(self.root_url(), self.client.clone())
    }

    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// POST with an idempotency key.
    pub async fn post_json_with_id<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        request_id: &str,
    ) -> ReqwestResponse {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .header("x-request-id", request_id)
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn delete(&self, path: &str) -> ReqwestResponse {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Act as the agent of `node`, reporting `datasets` as attached.
    pub async fn report_datasets(&self, node: &str, epoch: u64, datasets: &[Uuid]) -> bool {
        let report = NodeStateReport {
            epoch,
            datasets: datasets
                .iter()
                .map(|id| ObservedDataset {
                    dataset_id: *id,
                    status: DatasetStatus::Attached,
                    maximum_size: None,
                    path: None,
                })
                .collect(),
            containers: vec![],
        };
        let response = self
            .post_json(&format!("/agents/{}/state", node), &report)
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["accepted"].as_bool().unwrap()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
