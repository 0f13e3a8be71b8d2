// src/engine/mod.rs

//! Reconcile engine.
//!
//! This module ties together:
//! - rendering components and default-stage traits
//! - health evaluation over one live snapshot per tick
//! - PostDispatch gating
//! - status aggregation
//! - garbage collection of resources whose owner went away
//!
//! The pure core state machine lives in [`core`] (with per-event logic in
//! [`event_handlers`] and per-component logic in [`reconcile`]); the async/IO
//! shell is implemented in [`runtime`].

use std::time::Duration;

use crate::cluster::LiveSnapshot;
use crate::config::ConfigFile;
use crate::render::{Resource, ResourceKey};
use crate::status::AppStatus;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once the application phase is `running` (`--once`).
    pub exit_when_settled: bool,
    /// Exit after this many ticks (`--max-ticks`).
    pub max_ticks: Option<u64>,
}

/// Events flowing into the runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Reconcile against one consistent read of live state.
    Tick { live: LiveSnapshot },
    /// The manifest was edited and re-validated.
    ManifestChanged(Box<ConfigFile>),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Create or update these resources, in order.
    ApplyResources(Vec<Resource>),
    /// Delete these resources.
    DeleteResources(Vec<ResourceKey>),
    /// A new application status snapshot is available.
    PublishStatus(Box<AppStatus>),
    /// Engine timing changed with the manifest.
    Reconfigure {
        reconcile_interval: Duration,
        max_backoff: Duration,
    },
    /// Request that the process exits (`--once` when settled, `--max-ticks`).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
    /// Render failures in this step. Non-empty means the shell backs off.
    pub errors: Vec<String>,
}

impl CoreStep {
    fn idle(keep_running: bool) -> Self {
        Self {
            commands: Vec::new(),
            keep_running,
            errors: Vec::new(),
        }
    }

    /// The status published by this step, if any.
    pub fn status(&self) -> Option<&AppStatus> {
        self.commands.iter().find_map(|c| match c {
            CoreCommand::PublishStatus(s) => Some(s.as_ref()),
            _ => None,
        })
    }

    pub fn applied(&self) -> impl Iterator<Item = &Resource> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::ApplyResources(r) => Some(r.iter()),
                _ => None,
            })
            .flatten()
    }

    pub fn deleted(&self) -> impl Iterator<Item = &ResourceKey> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DeleteResources(k) => Some(k.iter()),
                _ => None,
            })
            .flatten()
    }
}

pub mod backoff;
pub mod core;
pub mod event_handlers;
pub mod inventory;
pub mod reconcile;
pub mod runtime;

pub use backoff::Backoff;
pub use core::CoreRuntime;
pub use inventory::{Inventory, Owner};
pub use runtime::{Runtime, StatusFile};
