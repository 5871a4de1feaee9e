//! Deterministic leader election
//!
//! Every node elects the online server with the smallest FNV-1a hash of its
//! URL, ties broken by lexicographic URL order. Peers that see the same
//! online set therefore converge on the same leader without exchanging any
//! votes. The hash must be identical across processes and builds, which is
//! why this module carries its own FNV instead of `DefaultHasher`.
//!
//! Known weakness: under asymmetric reachability, peers can observe
//! different online sets and elect different leaders. No consensus layer
//! repairs that here.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::server::Server;
use super::view::Cluster;

pub struct Election {
    cluster: Arc<Cluster>,
}

impl Election {
    pub fn new(cluster: Arc<Cluster>) -> Self {
        Self { cluster }
    }

    /// Whether a new election is due: no leader, the leader is unreachable,
    /// or more than one server carries the leader flag.
    pub fn should_reelect(&self) -> bool {
        let leader_flags = self
            .cluster
            .servers()
            .iter()
            .filter(|s| s.leader)
            .count();
        if leader_flags > 1 {
            warn!(leader_flags, "multiple leaders flagged, forcing reelection");
            return true;
        }

        match self.cluster.leader() {
            None => {
                debug!("no leader, election due");
                true
            }
            Some(leader) if !leader.status => {
                info!(leader = %leader.url, "leader offline, election due");
                true
            }
            Some(_) => false,
        }
    }

    /// Elect from the online set and install the winner. With nobody online
    /// the leader is cleared and `None` returned.
    pub fn elect_leader(&self) -> Option<Server> {
        let online = self.cluster.online();
        let winner = pick_leader(&online, url_hash).cloned();
        match &winner {
            Some(server) => {
                info!(leader = %server.url, candidates = online.len(), "leader elected");
                self.cluster.set_leader(Some(&server.url));
            }
            None => {
                warn!("no online servers, clearing leader");
                self.cluster.set_leader(None);
            }
        }
        winner
    }
}

/// Smallest hash wins; equal hashes fall back to lexicographic URL order.
fn pick_leader<'a>(candidates: &'a [Server], hash: impl Fn(&str) -> u64) -> Option<&'a Server> {
    candidates
        .iter()
        .min_by(|a, b| hash(&a.url).cmp(&hash(&b.url)).then_with(|| a.url.cmp(&b.url)))
}

/// FNV-1a, 64 bit. Stable across processes and toolchains.
pub(crate) fn url_hash(url: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in url.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
