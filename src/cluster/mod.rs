//! Cluster control plane
//!
//! Peer tracking, deterministic leader election, follower snapshot pull and
//! the periodic loop that drives all three.

pub mod controller;
pub mod election;
pub mod peer_client;
pub mod replicator;
pub mod server;
pub mod view;

pub use controller::ClusterController;
pub use election::Election;
pub use peer_client::{HttpPeerClient, PeerClient};
pub use replicator::Replicator;
pub use server::Server;
pub use view::{resolve_local_ip, Cluster};
