// src/cluster/mod.rs

//! Workload application and live state.
//!
//! - [`ClusterBackend`] is the seam the runtime applies through.
//! - [`InMemoryCluster`] keeps objects in memory and lets a caller act as the
//!   workload controller.
//! - [`SimulatedCluster`] adds a live overlay file on top, for running the
//!   binary without a real cluster.

pub mod backend;
pub mod memory;
pub mod overlay;
pub mod simulated;

pub use backend::{BoxFuture, ClusterBackend, LiveSnapshot};
pub use memory::InMemoryCluster;
pub use overlay::LiveOverlay;
pub use simulated::SimulatedCluster;
