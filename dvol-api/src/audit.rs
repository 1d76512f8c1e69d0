use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::Event;

/// Control service audit logger.
///
/// Writes one `audit` target record per committed change.
pub struct ApiAuditLogger {
    enabled: bool,
}

impl ApiAuditLogger {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn new_noop() -> Self {
        Self { enabled: false }
    }

    fn log(&self, message: String, object_ids: Vec<String>) {
        if self.enabled {
            info!(target: "audit", objects = ?object_ids, "{}", message);
        }
    }

    // Dataset events
    pub fn dataset_created(&self, dataset_id: &Uuid, primary: &str) {
        self.log(
            format!("Dataset created: {} on {}", dataset_id, primary),
            vec![dataset_id.to_string(), primary.to_string()],
        );
    }

    pub fn dataset_moved(&self, dataset_id: &Uuid, from: &str, to: &str) {
        self.log(
            format!("Dataset moved: {} from {} to {}", dataset_id, from, to),
            vec![dataset_id.to_string(), from.to_string(), to.to_string()],
        );
    }

    pub fn dataset_deleted(&self, dataset_id: &Uuid) {
        self.log(
            format!("Dataset deleted: {}", dataset_id),
            vec![dataset_id.to_string()],
        );
    }

    pub fn datasets_collected(&self, dataset_ids: &[Uuid]) {
        self.log(
            format!("Deleted datasets released everywhere: {}", dataset_ids.len()),
            dataset_ids.iter().map(Uuid::to_string).collect(),
        );
    }

    // Container events
    pub fn container_created(&self, name: &str, node: &str) {
        self.log(
            format!("Container created: {} on {}", name, node),
            vec![name.to_string(), node.to_string()],
        );
    }

    pub fn container_deleted(&self, name: &str) {
        self.log(format!("Container deleted: {}", name), vec![name.to_string()]);
    }

    /// Consume store events until the channel closes.
    pub fn start_event_listener(self: Arc<Self>, mut events: broadcast::Receiver<Event>) {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.record(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Audit listener lagged, {} events not recorded", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn record(&self, event: &Event) {
        match event {
            Event::DatasetCreated { dataset, .. } => {
                self.dataset_created(&dataset.dataset_id, &dataset.primary)
            }
            Event::DatasetMoved { dataset, from, .. } => {
                self.dataset_moved(&dataset.dataset_id, from, &dataset.primary)
            }
            Event::DatasetDeleted { dataset, .. } => self.dataset_deleted(&dataset.dataset_id),
            Event::DatasetsCollected { ids, .. } => self.datasets_collected(ids),
            Event::ContainerCreated { container, .. } => {
                self.container_created(&container.name, &container.node)
            }
            Event::ContainerDeleted { container, .. } => self.container_deleted(&container.name),
            // Reports arrive every poll interval; not audit-worthy.
            Event::StateReported { node, epoch } => {
                debug!("{} report from {} (epoch {})", event.resource_type(), node, epoch)
            }
        }
    }
}

impl Default for ApiAuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_audit_logger() -> Arc<ApiAuditLogger> {
    Arc::new(ApiAuditLogger::new())
}
