//! Service instance metadata
//!
//! The registry identifies an instance by (scheme, host, port, context);
//! the free-form `parameters` map carries extra metadata and never takes
//! part in equality.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// One registered endpoint of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMeta {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub context: String,
    /// Extra metadata (environment, version tags, ...). Not part of identity.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl InstanceMeta {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        context: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            context: context.into(),
            parameters: HashMap::new(),
        }
    }

    /// Convenience constructor for a plain HTTP endpoint with empty context.
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new("http", host, port, "")
    }

    /// Canonical URL form, `scheme://host:port/context`. Used as the
    /// instance part of timestamp keys, so it must stay stable.
    pub fn to_url(&self) -> String {
        format!("{}://{}:{}/{}", self.scheme, self.host, self.port, self.context)
    }
}

impl PartialEq for InstanceMeta {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.host == other.host
            && self.port == other.port
            && self.context == other.context
    }
}

impl Eq for InstanceMeta {}

impl Hash for InstanceMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.host.hash(state);
        self.port.hash(state);
        self.context.hash(state);
    }
}

/// Heartbeat timestamp key, `{service}@{instance-url}`.
pub fn timestamp_key(service: &str, instance: &InstanceMeta) -> String {
    format!("{}@{}", service, instance.to_url())
}

/// Split a timestamp key back into (service, instance-url).
///
/// Returns `None` when the `@` separator is missing or the service part is
/// empty; the sweeper skips such keys.
pub fn parse_timestamp_key(key: &str) -> Option<(&str, &str)> {
    match key.find('@') {
        Some(at) if at > 0 => Some((&key[..at], &key[at + 1..])),
        _ => None,
    }
}
