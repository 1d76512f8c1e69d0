//! Shared test utilities for dvol-node integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dvol_api::rest::{AppState, create_router};
use dvol_api::{ControlStore, DataStore};
use dvol_client::HttpClient;
use dvol_node::{AgentConfig, MemoryBackend, NodeAgent};
use tokio::net::TcpListener;

/// Control service running in-process on a loopback port.
pub struct TestControl {
    pub addr: SocketAddr,
    pub store: Arc<ControlStore>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestControl {
    pub async fn spawn() -> Self {
        let store = Arc::new(ControlStore::in_memory());
        let router = create_router(Arc::new(AppState {
            store: store.clone() as Arc<dyn DataStore>,
        }));

        let port = portpicker::pick_unused_port().expect("No available port");
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            store,
            shutdown_tx,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> HttpClient {
        HttpClient::new(self.endpoint())
    }

    pub fn agent(&self, node: &str, backend: Arc<MemoryBackend>) -> NodeAgent {
        NodeAgent::new(
            AgentConfig {
                node: node.to_string(),
                control_endpoint: self.endpoint(),
                poll_interval: Duration::from_millis(200),
            },
            backend,
        )
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
