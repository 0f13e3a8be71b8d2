// src/watch/event_handler.rs

//! Turning manifest file changes into `ManifestChanged` events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{load_with_fs, ConfigFile};
use crate::fs::FileSystem;
use crate::watch::hash::Fingerprint;

/// Re-reads the manifest after a change notification.
///
/// Remembers the fingerprint of the last manifest handed to the runtime, so
/// unchanged content is ignored. Invalid manifests are logged and skipped; the
/// runtime keeps using the last valid one.
#[derive(Debug)]
pub struct ManifestReloader {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    last: Fingerprint,
}

impl ManifestReloader {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>, loaded: Fingerprint) -> Self {
        let path = path.into();
        let path = fs.canonicalize(&path).unwrap_or(path);
        Self {
            fs,
            path,
            last: loaded,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a changed path refers to the watched manifest.
    ///
    /// Paths that no longer resolve (a removed or renamed-away file) are
    /// compared as given.
    pub fn concerns(&self, changed: &Path) -> bool {
        if changed == self.path {
            return true;
        }
        match self.fs.canonicalize(changed) {
            Ok(resolved) => resolved == self.path,
            Err(_) => false,
        }
    }

    /// Reload the manifest. Returns the new config if its content changed
    /// and it is valid.
    pub fn reload(&mut self) -> Option<ConfigFile> {
        let (config, contents) = match load_with_fs(self.fs.as_ref(), &self.path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "manifest change rejected; keeping previous manifest");
                return None;
            }
        };

        let fingerprint = Fingerprint::of(&contents);
        if fingerprint == self.last {
            debug!(path = ?self.path, %fingerprint, "manifest content unchanged; ignoring");
            return None;
        }

        info!(path = ?self.path, from = %self.last, to = %fingerprint, "manifest reloaded");
        self.last = fingerprint;
        Some(config)
    }
}
