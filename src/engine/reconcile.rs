// src/engine/reconcile.rs

//! One component's share of a reconcile tick.
//!
//! Order within a component:
//! 1. render the component, then default-stage traits (patches first merged
//!    into the primary output)
//! 2. judge the component from the live snapshot
//! 3. gate PostDispatch traits on that judgement; render dispatched ones from
//!    live state
//! 4. judge every rendered trait from its own live outputs
//!
//! Nothing here performs IO; the caller applies what was rendered.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cluster::LiveSnapshot;
use crate::config::{ComponentConfig, ConfigFile};
use crate::dispatch::{DispatchPhase, DispatchTracker, PlannedTrait, StagePlan, PENDING_REASON};
use crate::engine::inventory::Owner;
use crate::health::{self, HealthResult, HealthSpec};
use crate::render::{
    apply_trait_patch, render_component, render_trait_outputs, RenderMeta, RenderedComponent,
    Resource,
};
use crate::status::{ComponentStatus, TraitStatus};
use crate::types::TraitId;

/// Inputs shared by every component in a tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub config: &'a ConfigFile,
    pub generation: u64,
    pub tick: u64,
    pub live: &'a LiveSnapshot,
}

/// What reconciling one component produced.
#[derive(Debug, Clone)]
pub struct ComponentOutcome {
    pub status: ComponentStatus,
    /// Successfully rendered owners with their resources, in apply order
    /// (component before its traits).
    pub rendered: Vec<(Owner, Vec<Resource>)>,
    /// Render failures, already reflected in `status`.
    pub errors: Vec<String>,
}

/// Live view of a set of rendered resources.
struct LiveView {
    primary: Option<Value>,
    outputs: BTreeMap<String, Value>,
    applied: bool,
}

fn live_outputs(live: &LiveSnapshot, outputs: &BTreeMap<String, Resource>) -> BTreeMap<String, Value> {
    outputs
        .iter()
        .filter_map(|(name, r)| live.get(&r.key).map(|v| (name.clone(), v.clone())))
        .collect()
}

fn component_live_view(live: &LiveSnapshot, rendered: &RenderedComponent) -> LiveView {
    LiveView {
        primary: live.get(&rendered.primary.key).cloned(),
        outputs: live_outputs(live, &rendered.outputs),
        applied: live.contains_all(rendered.resources().map(|r| &r.key)),
    }
}

fn trait_status(planned: &PlannedTrait<'_>, health: &HealthResult) -> TraitStatus {
    TraitStatus {
        trait_type: planned.trait_type().to_string(),
        stage: planned.stage(),
        healthy: health.healthy,
        message: health.status_message().map(str::to_string),
        pending: false,
        reason: None,
    }
}

fn failed_trait(planned: &PlannedTrait<'_>, message: String) -> TraitStatus {
    TraitStatus {
        trait_type: planned.trait_type().to_string(),
        stage: planned.stage(),
        healthy: false,
        message: Some(message),
        pending: false,
        reason: None,
    }
}

/// Judge a trait from its own live outputs. PostDispatch traits also see the
/// component's live primary as `context.output`.
fn judge_trait(
    ctx: &TickContext<'_>,
    meta: &RenderMeta,
    planned: &PlannedTrait<'_>,
    outputs: &BTreeMap<String, Resource>,
    component_live: Option<&Value>,
) -> HealthResult {
    let own = live_outputs(ctx.live, outputs);
    let applied = ctx.live.contains_all(outputs.values().map(|r| &r.key));
    let scope = meta.scope(&planned.config.properties, component_live, &own);
    health::evaluate(HealthSpec::from(planned.definition), &scope, applied)
}

pub fn reconcile_component(
    ctx: &TickContext<'_>,
    name: &str,
    component: &ComponentConfig,
    tracker: &mut DispatchTracker,
) -> ComponentOutcome {
    let cfg = ctx.config;
    let meta = RenderMeta::for_component(cfg, name, component, ctx.generation);
    let plan = StagePlan::for_component(cfg, component);

    let mut statuses: Vec<Option<TraitStatus>> = vec![None; component.traits.len()];
    let mut rendered: Vec<(Owner, Vec<Resource>)> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let mut status = ComponentStatus {
        name: name.to_string(),
        namespace: meta.namespace.clone(),
        cluster: meta.cluster.clone(),
        component_type: component.component_type.clone(),
        healthy: false,
        message: None,
        traits: Vec::new(),
    };

    let rendered_component = match cfg.definition_of(component) {
        Some(def) => render_component(def, &meta, &component.properties).map(|rc| (def, rc)),
        None => {
            // Rejected by validation; keep the component visible regardless.
            status.message = Some(format!("unknown component type '{}'", component.component_type));
            return ComponentOutcome {
                status,
                rendered,
                errors,
            };
        }
    };

    let (def, mut rc) = match rendered_component {
        Ok(ok) => ok,
        Err(e) => {
            let msg = format!("render failed: {e}");
            warn!(component = %name, error = %e, "component render failed; keeping last applied resources");
            errors.push(format!("component {name}: {e}"));
            status.message = Some(msg);

            for planned in &plan.default {
                statuses[planned.index] = Some(failed_trait(
                    planned,
                    "not rendered: component failed to render".to_string(),
                ));
            }
            for planned in &plan.post_dispatch {
                let id = TraitId::new(name, planned.trait_type());
                statuses[planned.index] = Some(match tracker.observe(&id, false, ctx.tick).phase {
                    DispatchPhase::Pending => TraitStatus::pending(planned.trait_type(), PENDING_REASON),
                    DispatchPhase::Dispatched => failed_trait(
                        planned,
                        "not rendered: component failed to render".to_string(),
                    ),
                });
            }
            status.traits = statuses.into_iter().flatten().collect();
            return ComponentOutcome {
                status,
                rendered,
                errors,
            };
        }
    };

    // Default stage: patch, then render outputs against the declared state.
    let mut default_outputs: Vec<(&PlannedTrait<'_>, BTreeMap<String, Resource>)> = Vec::new();
    for planned in &plan.default {
        let props = &planned.config.properties;
        let result = apply_trait_patch(&mut rc, planned.definition, &meta, props).and_then(|()| {
            let declared_outputs = rc.output_objects();
            render_trait_outputs(
                planned.definition,
                planned.trait_type(),
                &meta,
                props,
                Some(&rc.primary.object),
                &declared_outputs,
            )
        });
        match result {
            Ok(outputs) => default_outputs.push((planned, outputs)),
            Err(e) => {
                warn!(component = %name, trait_type = %planned.trait_type(), error = %e, "trait render failed");
                errors.push(format!("trait {name}/{}: {e}", planned.trait_type()));
                statuses[planned.index] = Some(failed_trait(planned, format!("render failed: {e}")));
            }
        }
    }

    rendered.push((
        Owner::Component(name.to_string()),
        rc.resources().cloned().collect(),
    ));

    // Component health from the live snapshot.
    let view = component_live_view(ctx.live, &rc);
    let scope = meta.scope(&component.properties, view.primary.as_ref(), &view.outputs);
    let component_health = health::evaluate(HealthSpec::from(def), &scope, view.applied);
    status.healthy = component_health.healthy;
    status.message = component_health.status_message().map(str::to_string);
    debug!(
        component = %name,
        healthy = status.healthy,
        applied = view.applied,
        "component judged"
    );

    for (planned, outputs) in default_outputs {
        let h = judge_trait(ctx, &meta, planned, &outputs, None);
        statuses[planned.index] = Some(trait_status(planned, &h));
        rendered.push((
            Owner::Trait(TraitId::new(name, planned.trait_type())),
            outputs.into_values().collect(),
        ));
    }

    // PostDispatch: level-triggered gate on this tick's component health.
    for planned in &plan.post_dispatch {
        let id = TraitId::new(name, planned.trait_type());
        let obs = tracker.observe(&id, component_health.healthy, ctx.tick);

        if obs.phase == DispatchPhase::Pending {
            if obs.warn {
                warn!(
                    component = %name,
                    trait_type = %planned.trait_type(),
                    pending_ticks = obs.pending_ticks,
                    "PostDispatch trait still waiting for component to be healthy"
                );
            }
            statuses[planned.index] = Some(TraitStatus::pending(planned.trait_type(), PENDING_REASON));
            continue;
        }

        let props = &planned.config.properties;
        match render_trait_outputs(
            planned.definition,
            planned.trait_type(),
            &meta,
            props,
            view.primary.as_ref(),
            &view.outputs,
        ) {
            Ok(outputs) => {
                let h = judge_trait(ctx, &meta, planned, &outputs, view.primary.as_ref());
                statuses[planned.index] = Some(trait_status(planned, &h));
                rendered.push((Owner::Trait(id), outputs.into_values().collect()));
            }
            Err(e) => {
                warn!(component = %name, trait_type = %planned.trait_type(), error = %e, "PostDispatch trait render failed");
                errors.push(format!("trait {id}: {e}"));
                statuses[planned.index] = Some(failed_trait(planned, format!("render failed: {e}")));
            }
        }
    }

    status.traits = statuses.into_iter().flatten().collect();
    ComponentOutcome {
        status,
        rendered,
        errors,
    }
}
