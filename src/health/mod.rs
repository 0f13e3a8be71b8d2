// src/health/mod.rs

//! Health evaluation: runs `health_policy` (`isHealth`) and `custom_status`
//! (`message`) programs over a snapshot of live state.
//!
//! Evaluation is pure. Failures never escape as errors; they mark the entity
//! unhealthy and carry a diagnostic instead.

pub mod evaluator;

pub use evaluator::{evaluate, HealthResult, HealthSpec};

use crate::config::{ComponentDefinition, TraitDefinition};

impl<'a> From<&'a ComponentDefinition> for HealthSpec<'a> {
    fn from(def: &'a ComponentDefinition) -> Self {
        HealthSpec {
            health_policy: def.health_policy.as_deref(),
            custom_status: def.custom_status.as_deref(),
        }
    }
}

impl<'a> From<&'a TraitDefinition> for HealthSpec<'a> {
    fn from(def: &'a TraitDefinition) -> Self {
        HealthSpec {
            health_policy: def.health_policy.as_deref(),
            custom_status: def.custom_status.as_deref(),
        }
    }
}
