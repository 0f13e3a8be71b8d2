// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::cluster::LiveSnapshot;
use crate::config::ConfigFile;
use crate::engine::core::CoreState;
use crate::engine::reconcile::{reconcile_component, TickContext};
use crate::engine::{CoreCommand, CoreStep, RuntimeOptions};
use crate::render::ResourceKey;
use crate::status::AppPhase;

/// Handle a reconcile tick.
///
/// Every component is reconciled against the same snapshot; components never
/// block one another. Resources are applied component-first, and keys nobody
/// renders any more are deleted.
pub fn handle_tick(state: &mut CoreState, options: &RuntimeOptions, live: LiveSnapshot) -> CoreStep {
    state.tick += 1;
    let tick = state.tick;
    let applied_before = state.inventory.has_components();

    let ctx = TickContext {
        config: &state.config,
        generation: state.generation,
        tick,
        live: &live,
    };

    let mut apply = Vec::new();
    let mut delete = Vec::new();
    let mut errors = Vec::new();

    for (name, component) in &state.config.component {
        let outcome = reconcile_component(&ctx, name, component, &mut state.tracker);
        for (owner, resources) in outcome.rendered {
            let keys: BTreeSet<ResourceKey> = resources.iter().map(|r| r.key.clone()).collect();
            delete.extend(state.inventory.record(owner, keys));
            apply.extend(resources);
        }
        state.status.record(outcome.status);
        errors.extend(outcome.errors);
    }

    delete.extend(collect_orphans(state));

    // A key can move between owners; never delete something applied now.
    let applied_keys: BTreeSet<&ResourceKey> = apply.iter().map(|r| &r.key).collect();
    delete.retain(|k| !applied_keys.contains(k));
    delete.sort();
    delete.dedup();

    let snapshot = state.status.snapshot(
        &state.config.application.name,
        &state.config.application.namespace,
        state.generation,
        tick,
        applied_before,
    );

    debug!(
        tick,
        generation = state.generation,
        phase = %snapshot.phase,
        apply = apply.len(),
        delete = delete.len(),
        errors = errors.len(),
        "tick reconciled"
    );

    let settled = snapshot.phase == AppPhase::Running;
    let mut commands = Vec::new();
    if !apply.is_empty() {
        commands.push(CoreCommand::ApplyResources(apply));
    }
    if !delete.is_empty() {
        commands.push(CoreCommand::DeleteResources(delete));
    }
    commands.push(CoreCommand::PublishStatus(Box::new(snapshot)));

    let mut keep_running = true;
    if options.exit_when_settled && settled {
        info!(tick, "application is running; exiting");
        keep_running = false;
    }
    if let Some(max) = options.max_ticks {
        if tick >= max {
            info!(tick, max_ticks = max, "tick limit reached; exiting");
            keep_running = false;
        }
    }
    if !keep_running {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
        errors,
    }
}

/// Handle a reloaded manifest.
///
/// Starts a new generation: PostDispatch traits go back to `Pending`, and
/// resources of removed components and detached traits are deleted right
/// away.
pub fn handle_manifest_change(state: &mut CoreState, config: ConfigFile) -> CoreStep {
    let settings = config.settings;
    state.config = config;
    state.generation += 1;
    state.tracker.set_pending_warn_after(settings.pending_warn_after);
    state.tracker.begin_generation(state.generation, state.tick);

    let orphaned = collect_orphans(state);
    info!(
        generation = state.generation,
        components = state.config.component.len(),
        deleting = orphaned.len(),
        "manifest changed; new generation"
    );

    let mut commands = vec![CoreCommand::Reconfigure {
        reconcile_interval: settings.reconcile_interval,
        max_backoff: settings.max_backoff,
    }];
    if !orphaned.is_empty() {
        commands.push(CoreCommand::DeleteResources(orphaned));
    }

    CoreStep {
        commands,
        keep_running: true,
        errors: Vec::new(),
    }
}

/// Forget owners that left the manifest and return their resource keys.
fn collect_orphans(state: &mut CoreState) -> Vec<ResourceKey> {
    let config = &state.config;
    let removed = state.inventory.remove_where(|owner| owner.is_declared_in(config));
    state.tracker.retain(|id| {
        config
            .component
            .get(&id.component)
            .is_some_and(|c| c.traits.iter().any(|t| t.trait_type == id.trait_type))
    });
    state.status.retain(|name| config.component.contains_key(name));
    if !removed.is_empty() {
        info!(count = removed.len(), "deleting resources of removed components and traits");
    }
    removed
}
