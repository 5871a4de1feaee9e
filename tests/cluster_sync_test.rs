//! Cross-node behavior: snapshot transfer, replication and election
//! agreement, driven through in-memory transports.

use std::sync::Arc;

use async_trait::async_trait;

use beacon_registry::cluster::{Cluster, Election, PeerClient, Replicator, Server};
use beacon_registry::core::{
    InstanceMeta, ManualClock, RegistryError, RegistryResult, RegistryService, RegistryState,
    Snapshot,
};

/// In-memory peer transport backed by real registry states, keyed by URL.
struct InMemoryPeers {
    nodes: Vec<(String, Arc<RegistryState>)>,
}

#[async_trait]
impl PeerClient for InMemoryPeers {
    async fn probe(&self, url: &str) -> RegistryResult<Server> {
        self.nodes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(u, registry)| {
                let mut server = Server::new(u.clone());
                server.version = registry.global_version();
                server
            })
            .ok_or_else(|| RegistryError::PeerUnreachable {
                url: url.to_string(),
                reason: "no such node".to_string(),
            })
    }

    async fn fetch_snapshot(&self, url: &str) -> RegistryResult<Snapshot> {
        // Round-trip through JSON, as the real transport would.
        let (_, registry) = self
            .nodes
            .iter()
            .find(|(u, _)| u == url)
            .ok_or_else(|| RegistryError::PeerUnreachable {
                url: url.to_string(),
                reason: "no such node".to_string(),
            })?;
        let encoded = serde_json::to_vec(&registry.snapshot()).unwrap();
        serde_json::from_slice(&encoded).map_err(|e| RegistryError::SnapshotDecode {
            reason: e.to_string(),
        })
    }
}

fn populated_registry(clock: Arc<ManualClock>) -> Arc<RegistryState> {
    let registry = Arc::new(RegistryState::new(clock));
    let a = InstanceMeta::http("10.0.0.1", 8080);
    let b = InstanceMeta::http("10.0.0.2", 8080);
    let c = InstanceMeta::http("10.0.0.3", 9090);
    registry.register("user-service", a.clone());
    registry.register("user-service", b.clone());
    registry.register("order-service", c.clone());
    registry.renew("user-service", &a);
    registry.renew("user-service", &b);
    registry.renews(&["user-service", "order-service"], &c);
    registry
}

#[test]
fn snapshot_restores_identically_into_a_fresh_node() {
    let clock = Arc::new(ManualClock::new(1_000));
    let source = populated_registry(clock.clone());
    let exported = source.snapshot();

    let target = RegistryState::new(clock);
    target.restore(exported.clone());

    for service in ["user-service", "order-service"] {
        assert_eq!(
            target.get_all_instances(service),
            source.get_all_instances(service),
            "instances of {service} must match"
        );
        assert_eq!(target.version(service), source.version(service));
    }
    assert_eq!(target.timestamps(), source.timestamps());
    assert_eq!(target.snapshot().version, exported.version + 1);
}

#[test]
fn snapshot_survives_the_json_wire_format() {
    let clock = Arc::new(ManualClock::new(1_000));
    let source = populated_registry(clock.clone());
    let exported = source.snapshot();

    let encoded = serde_json::to_string(&exported).unwrap();
    let decoded: Snapshot = serde_json::from_str(&encoded).unwrap();

    let target = RegistryState::new(clock);
    target.restore(decoded);
    assert_eq!(
        target.get_all_instances("user-service"),
        source.get_all_instances("user-service")
    );
    assert_eq!(target.timestamps(), source.timestamps());
}

#[tokio::test]
async fn follower_converges_on_leader_state() {
    let clock = Arc::new(ManualClock::new(1_000));
    let leader_registry = populated_registry(clock.clone());
    let follower_registry = Arc::new(RegistryState::new(clock));

    let peers = Arc::new(InMemoryPeers {
        nodes: vec![("http://leader:8484".to_string(), leader_registry.clone())],
    });

    let view = Arc::new(
        Cluster::from_config(
            &[
                "http://leader:8484".to_string(),
                "http://follower:8484".to_string(),
            ],
            None,
            "follower",
        )
        .unwrap(),
    );
    view.set_leader(Some("http://leader:8484"));

    let replicator = Replicator::new(view, follower_registry.clone(), peers);
    replicator.sync_from_leader().await;

    assert_eq!(
        follower_registry.get_all_instances("user-service"),
        leader_registry.get_all_instances("user-service")
    );
    assert_eq!(
        follower_registry.version("user-service"),
        leader_registry.version("user-service")
    );

    // Each leader export bumps its snapshot counter, so a second pull
    // restores again; the data stays identical and the follower's counter
    // tracks the leader's newest export.
    let before = follower_registry.snapshot_version();
    replicator.sync_from_leader().await;
    assert_eq!(follower_registry.snapshot_version(), before + 1);
    assert_eq!(
        follower_registry.get_all_instances("user-service"),
        leader_registry.get_all_instances("user-service")
    );
}

#[tokio::test]
async fn replication_is_version_gated_across_rounds() {
    let clock = Arc::new(ManualClock::new(1_000));
    let leader_registry = Arc::new(RegistryState::new(clock.clone()));
    let follower_registry = Arc::new(RegistryState::new(clock));

    let peers = Arc::new(InMemoryPeers {
        nodes: vec![("http://leader:8484".to_string(), leader_registry.clone())],
    });
    let view = Arc::new(
        Cluster::from_config(
            &[
                "http://leader:8484".to_string(),
                "http://follower:8484".to_string(),
            ],
            None,
            "follower",
        )
        .unwrap(),
    );
    view.set_leader(Some("http://leader:8484"));
    let replicator = Replicator::new(view, follower_registry.clone(), peers);

    // Round 1: leader registers and heartbeats one instance.
    let instance = InstanceMeta::http("10.0.0.1", 8080);
    leader_registry.register("svc", instance.clone());
    leader_registry.renew("svc", &instance);
    replicator.sync_from_leader().await;
    assert_eq!(follower_registry.version("svc"), 1);

    // Round 2: more heartbeats on the leader flow through on the next pull.
    leader_registry.renew("svc", &instance);
    leader_registry.renew("svc", &instance);
    replicator.sync_from_leader().await;
    assert_eq!(follower_registry.version("svc"), 3);
}

#[test]
fn independent_views_elect_the_same_leader() {
    let urls = [
        "http://10.0.0.1:8484",
        "http://10.0.0.2:8484",
        "http://10.0.0.3:8484",
    ];
    let list: Vec<String> = urls.iter().map(|u| u.to_string()).collect();

    let mut winners = Vec::new();
    for (idx, _) in urls.iter().enumerate() {
        let view = Arc::new(
            Cluster::from_config(&list, None, &format!("10.0.0.{}", idx + 1)).unwrap(),
        );
        let election = Election::new(view);
        winners.push(election.elect_leader().unwrap().url);
    }
    assert_eq!(winners[0], winners[1]);
    assert_eq!(winners[1], winners[2]);
}

#[test]
fn views_agreeing_on_a_downed_peer_agree_on_the_next_leader() {
    let urls = [
        "http://10.0.0.1:8484",
        "http://10.0.0.2:8484",
        "http://10.0.0.3:8484",
    ];
    let list: Vec<String> = urls.iter().map(|u| u.to_string()).collect();

    // Find the first-choice winner, then mark it down in every view.
    let probe_view = Arc::new(Cluster::from_config(&list, None, "10.0.0.1").unwrap());
    let first_choice = Election::new(probe_view).elect_leader().unwrap().url;

    let mut winners = Vec::new();
    for (idx, _) in urls.iter().enumerate() {
        let self_ip = format!("10.0.0.{}", idx + 1);
        let view = Arc::new(Cluster::from_config(&list, None, &self_ip).unwrap());
        view.set_status(&first_choice, false);
        if view.self_url() == first_choice {
            // The downed node itself cannot observe its own death; skip it,
            // matching what a partitioned cluster actually computes.
            continue;
        }
        winners.push(Election::new(view).elect_leader().unwrap().url);
    }

    assert!(winners.len() >= 2);
    assert!(winners.iter().all(|w| *w == winners[0]));
    assert_ne!(winners[0], first_choice);
}
