//! Cluster loop
//!
//! The fixed-period driver: probe every peer, reelect when the leader view
//! is bad, then run the follower replication step. Each phase is isolated;
//! a failure in one never skips the others or kills the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use super::election::Election;
use super::peer_client::PeerClient;
use super::replicator::Replicator;
use super::view::Cluster;

pub struct ClusterController {
    cluster: Arc<Cluster>,
    election: Election,
    replicator: Replicator,
    peers: Arc<dyn PeerClient>,
    interval: Duration,
}

impl ClusterController {
    pub fn new(
        cluster: Arc<Cluster>,
        election: Election,
        replicator: Replicator,
        peers: Arc<dyn PeerClient>,
        interval: Duration,
    ) -> Self {
        Self {
            cluster,
            election,
            replicator,
            peers,
            interval,
        }
    }

    pub async fn event_loop(self, mut shutdown: watch::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "cluster loop started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; skip the zeroth tick so peers get a
        // chance to come up first.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("cluster loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One probe -> elect -> replicate round.
    pub async fn tick(&self) {
        self.probe_peers().await;

        if self.election.should_reelect() {
            self.election.elect_leader();
        }

        self.replicator.sync_from_leader().await;
    }

    async fn probe_peers(&self) {
        self.cluster.mark_self_up();
        let self_url = self.cluster.self_url().to_string();

        for server in self.cluster.servers() {
            if server.url == self_url {
                continue;
            }
            match self.peers.probe(&server.url).await {
                Ok(info) => {
                    self.cluster.set_status(&server.url, true);
                    self.cluster.set_version(&server.url, info.version);
                }
                Err(err) => {
                    debug!(peer = %server.url, error = %err, "peer probe failed");
                    self.cluster.set_status(&server.url, false);
                }
            }
        }
    }
}
