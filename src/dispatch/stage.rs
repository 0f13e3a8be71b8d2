// src/dispatch/stage.rs

use crate::config::{ComponentConfig, ConfigFile, TraitConfig, TraitDefinition};
use crate::types::DispatchStage;

/// Reason reported while a PostDispatch trait waits on its component.
pub const PENDING_REASON: &str = "waiting for component to be healthy";

/// A trait attached to a component, resolved against its definition.
#[derive(Debug, Clone, Copy)]
pub struct PlannedTrait<'a> {
    /// Position in the component's `traits` list.
    pub index: usize,
    pub config: &'a TraitConfig,
    pub definition: &'a TraitDefinition,
}

impl PlannedTrait<'_> {
    pub fn stage(&self) -> DispatchStage {
        self.definition.stage
    }

    pub fn trait_type(&self) -> &str {
        &self.config.trait_type
    }
}

/// A component's traits split by stage, each list in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StagePlan<'a> {
    pub default: Vec<PlannedTrait<'a>>,
    pub post_dispatch: Vec<PlannedTrait<'a>>,
}

impl<'a> StagePlan<'a> {
    /// Classify `component`'s traits. Traits whose definition is missing are
    /// skipped; validation rejects such manifests.
    pub fn for_component(cfg: &'a ConfigFile, component: &'a ComponentConfig) -> Self {
        let mut plan = StagePlan::default();
        for (index, config) in component.traits.iter().enumerate() {
            let Some(definition) = cfg.trait_definition_of(config) else {
                continue;
            };
            let planned = PlannedTrait {
                index,
                config,
                definition,
            };
            match definition.stage {
                DispatchStage::Default => plan.default.push(planned),
                DispatchStage::PostDispatch => plan.post_dispatch.push(planned),
            }
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.default.len() + self.post_dispatch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
