//! Cluster peer model

use serde::{Deserialize, Serialize};

/// One peer of the registry cluster. Identity is the canonical
/// `scheme://host:port` URL; the remaining fields are mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    /// Reachability as of the last probe. The local node is always `true`.
    pub status: bool,
    pub leader: bool,
    /// Last observed global version of the peer. Informational.
    pub version: u64,
}

impl Server {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: true,
            leader: false,
            version: 0,
        }
    }

    /// Host portion of the URL, e.g. `192.168.1.5` out of
    /// `http://192.168.1.5:8484`.
    pub fn host(&self) -> Option<&str> {
        let rest = match self.url.find("://") {
            Some(idx) => &self.url[idx + 3..],
            None => self.url.as_str(),
        };
        let end = rest.find(|c| c == ':' || c == '/').unwrap_or(rest.len());
        if end == 0 {
            None
        } else {
            Some(&rest[..end])
        }
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Server {}
