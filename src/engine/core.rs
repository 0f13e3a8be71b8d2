// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading live state from the cluster backend
//! - applying and deleting resources
//! - publishing status
//! - handling Ctrl+C / shutdown
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or cluster.

use crate::config::ConfigFile;
use crate::dispatch::DispatchTracker;
use crate::engine::event_handlers::{handle_manifest_change, handle_tick};
use crate::engine::inventory::Inventory;
use crate::engine::{CoreStep, RuntimeEvent, RuntimeOptions};
use crate::status::{AppStatus, StatusAggregator};

/// Mutable state shared by the event handlers.
#[derive(Debug)]
pub struct CoreState {
    pub config: ConfigFile,
    /// Bumped whenever a changed manifest is loaded; starts at 1.
    pub generation: u64,
    /// Number of ticks handled so far.
    pub tick: u64,
    pub tracker: DispatchTracker,
    pub inventory: Inventory,
    pub status: StatusAggregator,
}

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    state: CoreState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(config: ConfigFile, options: RuntimeOptions) -> Self {
        let mut tracker = DispatchTracker::new(config.settings.pending_warn_after);
        tracker.begin_generation(1, 0);
        Self {
            state: CoreState {
                config,
                generation: 1,
                tick: 0,
                tracker,
                inventory: Inventory::new(),
                status: StatusAggregator::new(),
            },
            options,
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.state.config
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Expose the inventory (for tests).
    pub fn inventory(&self) -> &Inventory {
        &self.state.inventory
    }

    /// Expose the dispatch tracker (for tests).
    pub fn tracker(&self) -> &DispatchTracker {
        &self.state.tracker
    }

    /// Latest status as of the last tick.
    pub fn status(&self) -> AppStatus {
        let cfg = &self.state.config;
        self.state.status.snapshot(
            &cfg.application.name,
            &cfg.application.namespace,
            self.state.generation,
            self.state.tick,
            self.state.inventory.has_components(),
        )
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Tick { live } => handle_tick(&mut self.state, &self.options, live),
            RuntimeEvent::ManifestChanged(config) => handle_manifest_change(&mut self.state, *config),
            RuntimeEvent::ShutdownRequested => CoreStep::idle(false),
        }
    }
}
