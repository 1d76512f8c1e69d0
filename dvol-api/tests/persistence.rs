//! Configuration survives a control service restart.

mod common;

use std::sync::Arc;

use dvol_api::{ControlStore, StorageBackend};
use dvol_client::{ClusterClient, CreateDatasetRequest};

#[tokio::test]
async fn test_configuration_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let backend = StorageBackend::File {
        path: dir.path().join("configuration.json"),
    };

    let store = Arc::new(ControlStore::open(backend.clone()).await.unwrap());
    let server = common::TestServer::spawn_with_store(store).await;
    let dataset = server
        .http_client()
        .create_dataset(CreateDatasetRequest::new("node-a").metadata("name", "db"))
        .await
        .unwrap();
    server.shutdown().await;

    let store = Arc::new(ControlStore::open(backend).await.unwrap());
    let server = common::TestServer::spawn_with_store(store).await;
    let datasets = server
        .http_client()
        .list_datasets_configuration()
        .await
        .unwrap();
    assert_eq!(datasets, vec![dataset]);

    // Observed state starts empty after a restart
    assert!(
        server
            .http_client()
            .list_dataset_state()
            .await
            .unwrap()
            .is_empty()
    );

    server.shutdown().await;
}
