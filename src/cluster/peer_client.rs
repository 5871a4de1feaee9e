//! Peer transport
//!
//! The cluster loop talks to peers through the `PeerClient` trait so tests
//! can substitute an in-memory transport. The HTTP implementation keeps a
//! pooled client with short timeouts; a slow peer must not stall the loop.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::{RegistryError, RegistryResult, Snapshot};

use super::server::Server;

const POOL_SIZE: usize = 16;
const TIMEOUT: Duration = Duration::from_millis(500);

#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Probe a peer's `/info` endpoint. `Ok` means reachable and carries the
    /// peer's self-description (including its observed version).
    async fn probe(&self, url: &str) -> RegistryResult<Server>;

    /// Fetch a peer's full snapshot from `/snapshot`.
    async fn fetch_snapshot(&self, url: &str) -> RegistryResult<Snapshot>;
}

pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(POOL_SIZE)
            .connect_timeout(TIMEOUT)
            .timeout(TIMEOUT)
            .build()
            .expect("reqwest client construction only fails on TLS misconfiguration");
        Self { client }
    }

    fn unreachable(url: &str, err: impl std::fmt::Display) -> RegistryError {
        RegistryError::PeerUnreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn probe(&self, url: &str) -> RegistryResult<Server> {
        let response = self
            .client
            .get(format!("{}/info", url))
            .send()
            .await
            .map_err(|e| Self::unreachable(url, e))?
            .error_for_status()
            .map_err(|e| Self::unreachable(url, e))?;

        response
            .json::<Server>()
            .await
            .map_err(|e| Self::unreachable(url, e))
    }

    async fn fetch_snapshot(&self, url: &str) -> RegistryResult<Snapshot> {
        let response = self
            .client
            .get(format!("{}/snapshot", url))
            .send()
            .await
            .map_err(|e| Self::unreachable(url, e))?
            .error_for_status()
            .map_err(|e| Self::unreachable(url, e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::unreachable(url, e))?;
        if body.is_empty() {
            return Err(RegistryError::SnapshotDecode {
                reason: "empty snapshot body".to_string(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| RegistryError::SnapshotDecode {
            reason: e.to_string(),
        })
    }
}
