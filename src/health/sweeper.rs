//! Liveness sweeper
//!
//! Periodically scans the heartbeat timestamps and unregisters instances
//! whose last heartbeat is older than the threshold. Timestamp entries
//! themselves are left in place; entries whose instance is already gone are
//! simply skipped on later sweeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::{parse_timestamp_key, Clock, RegistryService};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often a sweep runs.
    pub interval: Duration,
    /// A heartbeat older than this is considered dead.
    pub timeout_millis: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout_millis: 20_000,
        }
    }
}

pub struct LivenessSweeper {
    registry: Arc<dyn RegistryService>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl LivenessSweeper {
    pub fn new(
        registry: Arc<dyn RegistryService>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            registry,
            clock,
            config,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_ms = self.config.timeout_millis,
            "liveness sweeper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("liveness sweeper shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    self.sweep_once();
                }
            }
        }
    }

    /// One full pass over the timestamps. A bad entry is skipped, never fatal.
    pub fn sweep_once(&self) -> usize {
        let now = self.clock.now_millis();
        let mut evicted = 0;

        for (key, last_millis) in self.registry.timestamps() {
            let stale_for = now - last_millis;
            if stale_for <= self.config.timeout_millis {
                continue;
            }

            let Some((service, url)) = parse_timestamp_key(&key) else {
                warn!(%key, "skipping malformed timestamp key");
                continue;
            };

            let Some(instances) = self.registry.get_all_instances(service) else {
                debug!(service, "stale heartbeat for unknown service");
                continue;
            };
            match instances.iter().find(|i| i.to_url() == url) {
                Some(instance) => {
                    info!(service, url, stale_ms = stale_for, "evicting expired instance");
                    self.registry.unregister(service, instance);
                    evicted += 1;
                }
                None => {
                    debug!(service, url, "stale heartbeat for unregistered instance");
                }
            }
        }

        if evicted > 0 {
            info!(evicted, "liveness sweep complete");
        }
        evicted
    }
}
