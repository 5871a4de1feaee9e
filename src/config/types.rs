//! Configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete node configuration. Deserializable from a JSON file; every field
/// has a default so partial files work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,

    /// All cluster peers as `scheme://host:port`. Required in cluster mode.
    pub server_list: Vec<String>,

    /// This node's URL. Optional when the local address matches an entry of
    /// `server_list`.
    pub my_url: Option<String>,

    /// Cluster mode on/off. Off means the node is its own leader and no
    /// cluster loop runs.
    pub cluster_mode: bool,

    /// Cluster loop period (probe, elect, replicate) in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Instance liveness threshold in milliseconds. Must exceed the sweep
    /// interval.
    pub node_timeout_ms: u64,

    /// Liveness sweep period in milliseconds.
    pub sweep_interval_ms: u64,

    /// Durable snapshot location. Persistence is disabled when unset.
    pub snapshot_path: Option<PathBuf>,

    /// Durable save period in seconds.
    pub snapshot_interval_secs: u64,

    /// Default log level when `RUST_LOG` is not set.
    pub log_level: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8484,
            server_list: Vec::new(),
            my_url: None,
            cluster_mode: true,
            heartbeat_interval_ms: 5_000,
            node_timeout_ms: 20_000,
            sweep_interval_ms: 10_000,
            snapshot_path: None,
            snapshot_interval_secs: 30,
            log_level: None,
        }
    }
}
