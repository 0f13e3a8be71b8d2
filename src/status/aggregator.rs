// src/status/aggregator.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::status::model::{AppPhase, AppStatus, ComponentStatus};
use crate::types::ComponentName;

/// Latest status per component.
///
/// Each component has its own slot and is written independently of its
/// siblings, so a component's status is visible as soon as it has been
/// evaluated.
#[derive(Debug, Clone, Default)]
pub struct StatusAggregator {
    components: BTreeMap<ComponentName, ComponentStatus>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot for `status.name`.
    pub fn record(&mut self, status: ComponentStatus) {
        self.components.insert(status.name.clone(), status);
    }

    pub fn get(&self, component: &str) -> Option<&ComponentStatus> {
        self.components.get(component)
    }

    /// Drop slots of components that left the manifest.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.components.retain(|name, _| {
            let kept = keep(name);
            if !kept {
                debug!(component = %name, "dropping status of removed component");
            }
            kept
        });
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Application phase. `applied` says whether any component has been
    /// applied to a cluster yet.
    pub fn phase(&self, applied: bool) -> AppPhase {
        if !applied || self.components.is_empty() {
            AppPhase::Rendering
        } else if self.components.values().all(ComponentStatus::is_settled) {
            AppPhase::Running
        } else {
            AppPhase::RunningWorkflow
        }
    }

    pub fn snapshot(
        &self,
        name: &str,
        namespace: &str,
        generation: u64,
        tick: u64,
        applied: bool,
    ) -> AppStatus {
        AppStatus {
            name: name.to_string(),
            namespace: namespace.to_string(),
            generation,
            tick,
            phase: self.phase(applied),
            services: self.components.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::model::TraitStatus;
    use crate::types::DispatchStage;

    fn comp(name: &str, healthy: bool, traits: Vec<TraitStatus>) -> ComponentStatus {
        ComponentStatus {
            name: name.into(),
            namespace: "default".into(),
            cluster: "local".into(),
            component_type: "webservice".into(),
            healthy,
            message: None,
            traits,
        }
    }

    fn healthy_trait(t: &str) -> TraitStatus {
        TraitStatus {
            trait_type: t.into(),
            stage: DispatchStage::PostDispatch,
            healthy: true,
            message: None,
            pending: false,
            reason: None,
        }
    }

    #[test]
    fn phase_progression() {
        let mut agg = StatusAggregator::new();
        agg.record(comp("a", true, vec![healthy_trait("r")]));
        assert_eq!(agg.phase(false), AppPhase::Rendering);
        assert_eq!(agg.phase(true), AppPhase::Running);

        agg.record(comp("b", false, vec![TraitStatus::pending("r", "waiting")]));
        assert_eq!(agg.phase(true), AppPhase::RunningWorkflow);
    }

    #[test]
    fn healthy_sibling_is_visible_while_other_is_not() {
        let mut agg = StatusAggregator::new();
        agg.record(comp("c1", false, vec![TraitStatus::pending("r", "waiting")]));
        agg.record(comp("c2", true, vec![healthy_trait("r")]));

        let snap = agg.snapshot("demo", "default", 1, 3, true);
        assert_eq!(snap.phase, AppPhase::RunningWorkflow);
        let c2 = snap.service("c2").unwrap();
        assert!(c2.healthy);
        assert!(c2.traits[0].healthy);
        assert_eq!(snap.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), ["c1", "c2"]);
    }

    #[test]
    fn retain_drops_removed_components() {
        let mut agg = StatusAggregator::new();
        agg.record(comp("a", true, vec![]));
        agg.record(comp("b", true, vec![]));
        agg.retain(|n| n == "a");
        assert_eq!(agg.len(), 1);
        assert!(agg.get("b").is_none());
    }
}
