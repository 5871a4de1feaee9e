//! Beacon Registry - a lightweight replicated service registry
//!
//! Service providers register endpoints under a service name and keep them
//! alive by heartbeat; consumers discover endpoints by name. State is
//! replicated across a fixed set of peers: a deterministically elected
//! leader accepts writes, followers pull full snapshots from it.

pub mod cluster;
pub mod config;
pub mod core;
pub mod health;
pub mod logging;
pub mod server;
pub mod store;
