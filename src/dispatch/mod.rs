// src/dispatch/mod.rs

//! Trait stage scheduling.
//!
//! Default-stage traits are rendered together with their component.
//! PostDispatch traits wait until the component has been observed healthy,
//! tracked per generation by [`DispatchTracker`].

pub mod stage;
pub mod tracker;

pub use stage::{PlannedTrait, StagePlan, PENDING_REASON};
pub use tracker::{DispatchPhase, DispatchTracker, Observation};
