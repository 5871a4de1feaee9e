//! Follower-side replication
//!
//! Followers pull the leader's full snapshot each cluster tick and restore
//! it when the leader's snapshot version is ahead of the local one. Failed
//! or stale fetches are logged and dropped; the next tick retries.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::RegistryService;

use super::peer_client::PeerClient;
use super::view::Cluster;

pub struct Replicator {
    cluster: Arc<Cluster>,
    registry: Arc<dyn RegistryService>,
    peers: Arc<dyn PeerClient>,
}

impl Replicator {
    pub fn new(
        cluster: Arc<Cluster>,
        registry: Arc<dyn RegistryService>,
        peers: Arc<dyn PeerClient>,
    ) -> Self {
        Self {
            cluster,
            registry,
            peers,
        }
    }

    /// One replication attempt. No-op on the leader, without a live leader,
    /// or when the leader has nothing newer.
    pub async fn sync_from_leader(&self) {
        if self.cluster.is_self_leader() {
            return;
        }
        let Some(leader) = self.cluster.leader() else {
            debug!("no leader, skipping snapshot sync");
            return;
        };
        if !leader.status {
            debug!(leader = %leader.url, "leader offline, skipping snapshot sync");
            return;
        }

        let snapshot = match self.peers.fetch_snapshot(&leader.url).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(leader = %leader.url, error = %err, "snapshot fetch failed");
                return;
            }
        };

        let local_version = self.registry.snapshot_version();
        if !snapshot.should_sync(local_version) {
            debug!(
                local_version,
                leader_version = snapshot.version,
                "local state is current, skipping restore"
            );
            return;
        }

        info!(
            leader = %leader.url,
            local_version,
            leader_version = snapshot.version,
            "restoring snapshot from leader"
        );
        self.registry.restore(snapshot);
    }
}
