//! Cluster view
//!
//! Fixed membership built once from configuration. Only the per-server
//! status/leader/version flags mutate afterwards; the list itself never
//! grows or shrinks.

use std::net::UdpSocket;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::{RegistryError, RegistryResult};

use super::server::Server;

pub struct Cluster {
    servers: RwLock<Vec<Server>>,
    self_url: String,
}

impl Cluster {
    /// Build the view from the configured peer list.
    ///
    /// Any `localhost`/`127.0.0.1` in a peer URL is rewritten to the resolved
    /// local address so that URL comparison works across machines. The first
    /// entry whose host matches the local address becomes the local node; if
    /// none matches, a server is synthesized from `my_url` and appended.
    pub fn from_config(
        server_list: &[String],
        my_url: Option<&str>,
        local_ip: &str,
    ) -> RegistryResult<Self> {
        let mut servers: Vec<Server> = server_list
            .iter()
            .map(|url| Server::new(rewrite_loopback(url, local_ip)))
            .collect();

        let mut self_url = servers
            .iter()
            .find(|s| s.host() == Some(local_ip))
            .map(|s| s.url.clone());

        if self_url.is_none() {
            let Some(my_url) = my_url else {
                return Err(RegistryError::Internal {
                    reason: format!(
                        "no server entry matches local address {} and my_url is not set",
                        local_ip
                    ),
                });
            };
            let synthesized = Server::new(rewrite_loopback(my_url, local_ip));
            info!(url = %synthesized.url, "local node not in server list, adding it");
            self_url = Some(synthesized.url.clone());
            servers.push(synthesized);
        }

        let self_url = self_url.expect("self url resolved above");
        info!(
            peers = servers.len(),
            self_url = %self_url,
            "cluster view initialized"
        );
        Ok(Self {
            servers: RwLock::new(servers),
            self_url,
        })
    }

    /// Single-node view: the local node is trivially its own leader.
    pub fn single(my_url: impl Into<String>) -> Self {
        let url = my_url.into();
        let mut server = Server::new(url.clone());
        server.leader = true;
        Self {
            servers: RwLock::new(vec![server]),
            self_url: url,
        }
    }

    pub fn servers(&self) -> Vec<Server> {
        self.servers.read().clone()
    }

    pub fn online(&self) -> Vec<Server> {
        self.servers.read().iter().filter(|s| s.status).cloned().collect()
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn self_server(&self) -> Server {
        self.by_url(&self.self_url)
            .expect("self server is always present in the view")
    }

    pub fn by_url(&self, url: &str) -> Option<Server> {
        self.servers.read().iter().find(|s| s.url == url).cloned()
    }

    pub fn leader(&self) -> Option<Server> {
        self.servers.read().iter().find(|s| s.leader).cloned()
    }

    pub fn is_self_leader(&self) -> bool {
        self.servers
            .read()
            .iter()
            .any(|s| s.leader && s.url == self.self_url)
    }

    /// Clear every leader flag, then set it on `url` (when given).
    pub fn set_leader(&self, url: Option<&str>) {
        let mut servers = self.servers.write();
        for server in servers.iter_mut() {
            server.leader = false;
        }
        match url {
            Some(url) => {
                if let Some(server) = servers.iter_mut().find(|s| s.url == url) {
                    server.leader = true;
                    info!(leader = url, "leader installed");
                } else {
                    warn!(url, "cannot install unknown server as leader");
                }
            }
            None => info!("leader cleared"),
        }
    }

    /// Record a probe result. The local node is never marked down.
    pub fn set_status(&self, url: &str, status: bool) {
        if url == self.self_url {
            return;
        }
        let mut servers = self.servers.write();
        if let Some(server) = servers.iter_mut().find(|s| s.url == url) {
            if server.status != status {
                info!(url, status, "peer status changed");
            }
            server.status = status;
        }
    }

    pub fn set_version(&self, url: &str, version: u64) {
        let mut servers = self.servers.write();
        if let Some(server) = servers.iter_mut().find(|s| s.url == url) {
            server.version = version;
        }
    }

    /// Set a leader flag without clearing the others, reproducing the
    /// pathological multi-leader state that reelection repairs.
    #[cfg(test)]
    pub(crate) fn force_leader_flag(&self, url: &str) {
        let mut servers = self.servers.write();
        if let Some(server) = servers.iter_mut().find(|s| s.url == url) {
            server.leader = true;
        }
    }

    /// Force the local node up, as every probe cycle does.
    pub fn mark_self_up(&self) {
        let mut servers = self.servers.write();
        if let Some(server) = servers.iter_mut().find(|s| s.url == self.self_url) {
            server.status = true;
        }
    }
}

fn rewrite_loopback(url: &str, local_ip: &str) -> String {
    if url.contains("localhost") || url.contains("127.0.0.1") {
        url.replace("localhost", local_ip).replace("127.0.0.1", local_ip)
    } else {
        url.to_string()
    }
}

/// Best-effort local address discovery: open a UDP socket towards a public
/// address (no packets are sent) and read back the chosen source address.
pub fn resolve_local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip().to_string();
    debug!(%ip, "resolved local address");
    Some(ip)
}
