//! Periodic snapshot persistence
//!
//! Saves the state machine's snapshot to the durable store on a timer and
//! once more on shutdown. Store failures are logged and retried on the next
//! tick; in-memory state is never affected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::core::RegistryService;

use super::SnapshotStore;

pub struct SnapshotPersister {
    registry: Arc<dyn RegistryService>,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
}

impl SnapshotPersister {
    pub fn new(
        registry: Arc<dyn RegistryService>,
        store: Arc<dyn SnapshotStore>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            interval,
        }
    }

    /// Load any prior snapshot into the registry. Decode and read failures
    /// are logged and treated as an empty start.
    pub fn restore_on_startup(registry: &dyn RegistryService, store: &dyn SnapshotStore) {
        match store.load() {
            Ok(Some(snapshot)) => {
                info!(version = snapshot.version, "restoring persisted snapshot");
                registry.restore(snapshot);
            }
            Ok(None) => info!("no persisted snapshot, starting empty"),
            Err(err) => error!(error = %err, "failed to load persisted snapshot, starting empty"),
        }
    }

    /// Save the current state once. Used by the timer and the shutdown path.
    pub fn save_now(&self) {
        let snapshot = self.registry.snapshot();
        if let Err(err) = self.store.save(&snapshot) {
            error!(error = %err, "failed to persist snapshot");
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "snapshot persister started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("snapshot persister shutting down, writing final snapshot");
                    self.save_now();
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.save_now();
                }
            }
        }
    }
}
