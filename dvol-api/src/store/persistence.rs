//! Durable storage for the desired configuration.

use std::path::PathBuf;

use dvol_types::Configuration;
use tracing::{debug, info};

use super::error::{Result, StoreError};

/// Where the configuration lives.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Ephemeral, for development and tests.
    Memory,
    /// JSON document on disk, rewritten on every committed change.
    File { path: PathBuf },
}

/// Loads and saves the configuration for a [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct Persistence {
    backend: StorageBackend,
}

impl Persistence {
    pub fn new(backend: StorageBackend) -> Self {
        Self { backend }
    }

    /// Load the last saved configuration, if any.
    pub async fn load(&self) -> Result<Option<Configuration>> {
        let StorageBackend::File { path } = &self.backend else {
            return Ok(None);
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let config: Configuration = serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::Storage(format!("corrupt configuration {}: {}", path.display(), e))
                })?;
                info!(
                    "Loaded configuration version {} from {}",
                    config.version(),
                    path.display()
                );
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Durably save the configuration (write to a temp file, then rename).
    pub async fn save(&self, config: &Configuration) -> Result<()> {
        let StorageBackend::File { path } = &self.backend else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(config)
            .map_err(|e| StoreError::Internal(format!("failed to encode configuration: {}", e)))?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            StoreError::Storage(format!("failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Saved configuration version {}", config.version());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvol_types::{Command, Dataset};

    #[tokio::test]
    async fn test_memory_backend_never_loads() {
        let persistence = Persistence::new(StorageBackend::Memory);
        persistence.save(&Configuration::default()).await.unwrap();
        assert!(persistence.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(StorageBackend::File {
            path: dir.path().join("configuration.json"),
        });
        assert!(persistence.load().await.unwrap().is_none());

        let mut config = Configuration::default();
        config
            .apply(Command::CreateDataset {
                request_id: "r1".into(),
                dataset: Dataset::new("node-1"),
            })
            .unwrap();
        persistence.save(&config).await.unwrap();

        let loaded = persistence.load().await.unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_file_backend_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let persistence = Persistence::new(StorageBackend::File { path });
        assert!(matches!(
            persistence.load().await,
            Err(StoreError::Storage(_))
        ));
    }
}
