// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::watch::event_handler::ManifestReloader;
use crate::watch::hash::Fingerprint;

/// Handle for the manifest watcher.
///
/// Dropping this handle stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Directory to watch for a manifest path. Editors often replace files by
/// renaming, so the parent is watched rather than the file itself.
fn watch_dir(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    )
}

/// Watch `manifest` and send `RuntimeEvent::ManifestChanged` whenever its
/// content changes to a valid manifest.
///
/// - `loaded` is the fingerprint of the manifest the runtime started with.
/// - `runtime_tx` is the channel into the runtime.
pub fn spawn_manifest_watcher(
    manifest: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
    loaded: Fingerprint,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let manifest = manifest.into();
    let manifest = fs.canonicalize(&manifest).unwrap_or(manifest);
    let dir = watch_dir(&manifest);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("vela-dispatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("vela-dispatch: file watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    info!(path = ?manifest, "watching manifest for changes");

    let mut reloader = ManifestReloader::new(fs, manifest, loaded);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_relevant(&event.kind) || !event.paths.iter().any(|p| reloader.concerns(p)) {
                continue;
            }
            debug!(kind = ?event.kind, "manifest touched");

            let Some(config) = reloader.reload() else {
                continue;
            };
            if runtime_tx
                .send(RuntimeEvent::ManifestChanged(Box::new(config)))
                .await
                .is_err()
            {
                break;
            }
        }
        debug!("manifest watcher loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
