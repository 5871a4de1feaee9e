//! Instance liveness checking

pub mod sweeper;

pub use sweeper::{LivenessSweeper, SweeperConfig};
