// src/engine/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::cluster::ClusterBackend;
use crate::config::MAX_TICK_INTERVAL;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::render::ResourceKey;
use crate::status::AppStatus;

use super::backoff::Backoff;
use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Where each published status is also written as JSON (`--status-file`).
#[derive(Debug, Clone)]
pub struct StatusFile {
    pub fs: Arc<dyn FileSystem>,
    pub path: PathBuf,
}

impl StatusFile {
    fn write(&self, status: &AppStatus) -> Result<()> {
        let json = status.to_json_pretty()?;
        self.fs.write(&self.path, json.as_bytes())?;
        Ok(())
    }
}

/// Drives the reconcile loop: reads live state, feeds it to `CoreRuntime`,
/// and applies the resulting commands through a `ClusterBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// reconcile semantics. Cluster failures are logged and backed off; they
/// never stop the loop.
pub struct Runtime<C: ClusterBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    events_open: bool,
    cluster: C,
    backoff: Backoff,
    status_tx: watch::Sender<Option<AppStatus>>,
    status_file: Option<StatusFile>,
    /// Deletions that failed; their owners are already forgotten by the core.
    retry_deletes: Vec<ResourceKey>,
}

impl<C: ClusterBackend> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<C: ClusterBackend> Runtime<C> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, cluster: C) -> Self {
        let settings = core.config().settings;
        let (status_tx, _) = watch::channel(None);
        Self {
            core,
            event_rx,
            events_open: true,
            cluster,
            backoff: Backoff::new(settings.reconcile_interval, settings.max_backoff),
            status_tx,
            status_file: None,
            retry_deletes: Vec::new(),
        }
    }

    pub fn with_status_file(mut self, status_file: StatusFile) -> Self {
        self.status_file = Some(status_file);
        self
    }

    /// Receive every status the core publishes.
    pub fn subscribe(&self) -> watch::Receiver<Option<AppStatus>> {
        self.status_tx.subscribe()
    }

    /// Main loop.
    ///
    /// - Ticks immediately, then on the reconcile interval (or the current
    ///   backoff after a failing tick).
    /// - Consumes `RuntimeEvent`s from `event_rx` between ticks.
    /// - Returns the last published status.
    pub async fn run(mut self) -> Result<Option<AppStatus>> {
        info!(
            app = %self.core.config().application.name,
            components = self.core.config().component.len(),
            interval = ?self.backoff.current(),
            "reconcile loop started"
        );

        let mut next_tick = Instant::now();

        loop {
            tokio::select! {
                event = self.event_rx.recv(), if self.events_open => {
                    let Some(event) = event else {
                        debug!("runtime event channel closed; ticking only");
                        self.events_open = false;
                        continue;
                    };
                    debug!(?event, "runtime received event");
                    let step = self.core.step(event);
                    let mut failed = false;
                    for command in step.commands {
                        failed |= !self.execute_command(command).await;
                    }
                    if failed {
                        next_tick = deadline_after(self.backoff.next_delay(true));
                    }
                    if !step.keep_running {
                        info!("core requested exit; stopping runtime");
                        break;
                    }
                }
                _ = sleep_until(next_tick) => {
                    let (keep_running, had_errors) = self.tick().await;
                    let delay = self.backoff.next_delay(had_errors);
                    if had_errors {
                        debug!(?delay, "tick had errors; backing off");
                    }
                    next_tick = deadline_after(delay);
                    if !keep_running {
                        info!("core requested exit; stopping runtime");
                        break;
                    }
                }
            }
        }

        info!(tick = self.core.tick(), "runtime exiting");
        let last = self.status_tx.borrow().clone();
        Ok(last)
    }

    /// One reconcile pass. Returns `(keep_running, had_errors)`.
    async fn tick(&mut self) -> (bool, bool) {
        let mut had_errors = false;
        if !self.retry_deletes.is_empty() {
            let keys = std::mem::take(&mut self.retry_deletes);
            had_errors |= !self.execute_command(CoreCommand::DeleteResources(keys)).await;
        }

        let live = match self.cluster.snapshot().await {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "reading live state failed; skipping tick");
                return (true, true);
            }
        };
        debug!(objects = live.len(), "live snapshot read");

        let step = self.core.step(RuntimeEvent::Tick { live });
        had_errors |= !step.errors.is_empty();
        for command in step.commands {
            had_errors |= !self.execute_command(command).await;
        }
        (step.keep_running, had_errors)
    }

    /// Execute a single command from the core. Returns false if it failed.
    async fn execute_command(&mut self, command: CoreCommand) -> bool {
        match command {
            CoreCommand::ApplyResources(resources) => {
                let keys: Vec<String> = resources.iter().map(|r| r.key.to_string()).collect();
                debug!(?keys, "applying resources");
                if let Err(e) = self.cluster.apply(resources).await {
                    warn!(error = %e, "apply failed; will retry next tick");
                    return false;
                }
            }
            CoreCommand::DeleteResources(keys) => {
                info!(count = keys.len(), "deleting resources");
                if let Err(e) = self.cluster.delete(keys.clone()).await {
                    warn!(error = %e, "delete failed; will retry next tick");
                    self.retry_deletes.extend(keys);
                    return false;
                }
            }
            CoreCommand::PublishStatus(status) => {
                debug!(tick = status.tick, phase = %status.phase, "publishing status");
                if let Some(file) = &self.status_file {
                    if let Err(e) = file.write(&status) {
                        warn!(error = %e, path = ?file.path, "writing status file failed");
                    }
                }
                self.status_tx.send_replace(Some(*status));
            }
            CoreCommand::Reconfigure {
                reconcile_interval,
                max_backoff,
            } => {
                info!(?reconcile_interval, ?max_backoff, "engine timing reconfigured");
                self.backoff.reconfigure(reconcile_interval, max_backoff);
            }
            CoreCommand::RequestExit => {
                // The core already returns keep_running=false in this case.
                info!("core issued RequestExit command");
            }
        }
        true
    }
}

/// When the next tick is due. Delays past the supported bound are clamped.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(MAX_TICK_INTERVAL))
        .unwrap_or(now)
}
