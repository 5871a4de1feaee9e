//! Registry state machine
//!
//! `RegistryState` is the single authority over the service registry, the
//! heartbeat timestamps and all version counters. Every mutation entry point
//! serializes on one lock; the timestamps map is concurrent so the liveness
//! sweeper never contends with heartbeat writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::clock::Clock;
use super::instance::{timestamp_key, InstanceMeta};
use super::snapshot::Snapshot;

/// The operations the registry exposes. Kept as a trait so transports and
/// periodic tasks can be exercised against in-memory doubles.
pub trait RegistryService: Send + Sync {
    /// Add an instance under a service. Re-registering an identical instance
    /// (by identity) is a no-op that returns the stored value. Does not touch
    /// timestamps or any version counter.
    fn register(&self, service: &str, instance: InstanceMeta) -> InstanceMeta;

    /// Remove an instance. Unknown services and absent instances succeed
    /// silently. Does not touch timestamps or version counters.
    fn unregister(&self, service: &str, instance: &InstanceMeta) -> InstanceMeta;

    /// Current instances of a service. `None` for a service never registered,
    /// distinguishable from present-but-empty.
    fn get_all_instances(&self, service: &str) -> Option<Vec<InstanceMeta>>;

    /// Record a heartbeat: stamps `{service}@{url}` with the current time,
    /// bumps the service version and the global version by one each. The
    /// instance is not required to be registered.
    fn renew(&self, service: &str, instance: &InstanceMeta) -> InstanceMeta;

    /// Batch heartbeat: per service, stamps the timestamp and bumps the
    /// service version; the global version is bumped exactly once for the
    /// whole batch.
    fn renews(&self, services: &[&str], instance: &InstanceMeta) -> InstanceMeta;

    /// Heartbeat version of a service, 0 when unknown.
    fn version(&self, service: &str) -> u64;

    /// Versions for a batch of services, 0 for unknown ones.
    fn versions(&self, services: &[&str]) -> HashMap<String, u64>;

    /// Global heartbeat counter; replicators use it to detect change.
    fn global_version(&self) -> u64;

    /// Snapshot counter as of the last export. Reading it does not bump it.
    fn snapshot_version(&self) -> u64;

    /// Export a deep copy of the full state. Bumps the snapshot counter and
    /// embeds the new value.
    fn snapshot(&self) -> Snapshot;

    /// Replace the full state with a snapshot's content. The snapshot counter
    /// becomes the snapshot's value; the global version becomes
    /// `max(current, snapshot.version)`.
    fn restore(&self, snapshot: Snapshot);

    /// Copy of the heartbeat timestamps, keyed `{service}@{url}`.
    fn timestamps(&self) -> HashMap<String, i64>;
}

struct Tables {
    registry: HashMap<String, Vec<InstanceMeta>>,
    versions: HashMap<String, u64>,
}

pub struct RegistryState {
    tables: Mutex<Tables>,
    timestamps: DashMap<String, i64>,
    global_version: AtomicU64,
    snapshot_version: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RegistryState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                registry: HashMap::new(),
                versions: HashMap::new(),
            }),
            timestamps: DashMap::new(),
            global_version: AtomicU64::new(0),
            snapshot_version: AtomicU64::new(0),
            clock,
        }
    }
}

impl RegistryService for RegistryState {
    fn register(&self, service: &str, instance: InstanceMeta) -> InstanceMeta {
        let mut tables = self.tables.lock();
        let instances = tables.registry.entry(service.to_string()).or_default();
        if let Some(existing) = instances.iter().find(|i| **i == instance) {
            return existing.clone();
        }
        debug!(service, url = %instance.to_url(), "registered instance");
        instances.push(instance.clone());
        instance
    }

    fn unregister(&self, service: &str, instance: &InstanceMeta) -> InstanceMeta {
        let mut tables = self.tables.lock();
        if let Some(instances) = tables.registry.get_mut(service) {
            if let Some(pos) = instances.iter().position(|i| i == instance) {
                instances.remove(pos);
                debug!(service, url = %instance.to_url(), "unregistered instance");
            }
        }
        instance.clone()
    }

    fn get_all_instances(&self, service: &str) -> Option<Vec<InstanceMeta>> {
        self.tables.lock().registry.get(service).cloned()
    }

    fn renew(&self, service: &str, instance: &InstanceMeta) -> InstanceMeta {
        let mut tables = self.tables.lock();
        self.timestamps
            .insert(timestamp_key(service, instance), self.clock.now_millis());
        *tables.versions.entry(service.to_string()).or_insert(0) += 1;
        self.global_version.fetch_add(1, Ordering::SeqCst);
        instance.clone()
    }

    fn renews(&self, services: &[&str], instance: &InstanceMeta) -> InstanceMeta {
        let mut tables = self.tables.lock();
        let now = self.clock.now_millis();
        for service in services {
            self.timestamps.insert(timestamp_key(service, instance), now);
            *tables.versions.entry(service.to_string()).or_insert(0) += 1;
        }
        // One global bump per batch, not per service.
        self.global_version.fetch_add(1, Ordering::SeqCst);
        instance.clone()
    }

    fn version(&self, service: &str) -> u64 {
        self.tables.lock().versions.get(service).copied().unwrap_or(0)
    }

    fn versions(&self, services: &[&str]) -> HashMap<String, u64> {
        let tables = self.tables.lock();
        services
            .iter()
            .map(|s| (s.to_string(), tables.versions.get(*s).copied().unwrap_or(0)))
            .collect()
    }

    fn global_version(&self) -> u64 {
        self.global_version.load(Ordering::SeqCst)
    }

    fn snapshot_version(&self) -> u64 {
        self.snapshot_version.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Snapshot {
        let tables = self.tables.lock();
        let version = self.snapshot_version.fetch_add(1, Ordering::SeqCst) + 1;
        Snapshot {
            registry: tables.registry.clone(),
            versions: tables.versions.clone(),
            timestamps: self
                .timestamps
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            version,
            create_time: self.clock.now_millis(),
        }
    }

    fn restore(&self, snapshot: Snapshot) {
        let mut tables = self.tables.lock();
        tables.registry.clear();
        tables.versions.clear();
        self.timestamps.clear();

        tables.registry.extend(snapshot.registry);
        tables.versions.extend(snapshot.versions);
        for (key, millis) in snapshot.timestamps {
            self.timestamps.insert(key, millis);
        }

        self.snapshot_version.store(snapshot.version, Ordering::SeqCst);
        self.global_version
            .fetch_max(snapshot.version, Ordering::SeqCst);
        info!(
            version = snapshot.version,
            services = tables.registry.len(),
            "restored registry from snapshot"
        );
    }

    fn timestamps(&self) -> HashMap<String, i64> {
        self.timestamps
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
