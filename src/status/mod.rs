// src/status/mod.rs

//! Application status: per-component slots, the aggregated snapshot and its
//! JSON and human-readable forms.

pub mod aggregator;
pub mod display;
pub mod model;

pub use aggregator::StatusAggregator;
pub use model::{AppPhase, AppStatus, ComponentStatus, TraitStatus};
