//! Full-state snapshot
//!
//! A snapshot is the unit of both replication and durable persistence: a
//! self-describing copy of the registry, version counters and heartbeat
//! timestamps, restorable without side information. Field names on the wire
//! match the blobs written by earlier deployments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::instance::InstanceMeta;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Service name to its registered instances, insertion order preserved.
    #[serde(rename = "REGISTRY", default)]
    pub registry: HashMap<String, Vec<InstanceMeta>>,

    /// Per-service heartbeat version counters.
    #[serde(rename = "VERSIONS", default)]
    pub versions: HashMap<String, u64>,

    /// `{service}@{url}` to last-heartbeat wall-clock millis.
    #[serde(rename = "TIMESTAMPS", default)]
    pub timestamps: HashMap<String, i64>,

    /// Snapshot counter at export time; recipients compare against their own.
    #[serde(default)]
    pub version: u64,

    #[serde(rename = "createTime", default)]
    pub create_time: i64,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.versions.is_empty() && self.timestamps.is_empty()
    }

    /// Number of services captured.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether a node at `local_version` should replace its state with this
    /// snapshot.
    pub fn should_sync(&self, local_version: u64) -> bool {
        self.version > local_version
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            registry: HashMap::new(),
            versions: HashMap::new(),
            timestamps: HashMap::new(),
            version: 0,
            create_time: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        let mut snapshot = Snapshot::default();
        snapshot
            .registry
            .insert("svc".to_string(), vec![InstanceMeta::http("h", 1)]);
        snapshot.versions.insert("svc".to_string(), 3);
        snapshot.timestamps.insert("svc@http://h:1/".to_string(), 42);
        snapshot.version = 7;
        snapshot.create_time = 1234;

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("REGISTRY").is_some());
        assert!(json.get("VERSIONS").is_some());
        assert!(json.get("TIMESTAMPS").is_some());
        assert_eq!(json["version"], 7);
        assert_eq!(json["createTime"], 1234);
    }

    #[test]
    fn decodes_partial_blobs() {
        // Blobs written before a field existed must still load.
        let snapshot: Snapshot = serde_json::from_str(r#"{"version": 2}"#).unwrap();
        assert_eq!(snapshot.version, 2);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn should_sync_is_strictly_greater() {
        let snapshot = Snapshot {
            version: 5,
            ..Default::default()
        };
        assert!(snapshot.should_sync(4));
        assert!(!snapshot.should_sync(5));
        assert!(!snapshot.should_sync(6));
    }
}
