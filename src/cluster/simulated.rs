// src/cluster/simulated.rs

use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::cluster::backend::{BoxFuture, ClusterBackend, LiveSnapshot};
use crate::cluster::memory::InMemoryCluster;
use crate::cluster::overlay::LiveOverlay;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::render::{Resource, ResourceKey};

/// In-memory cluster whose live state is driven by an overlay file.
///
/// The overlay is re-read on every snapshot, so editing it while the engine
/// runs changes what the next tick observes. A missing file means no overlay.
#[derive(Debug, Clone)]
pub struct SimulatedCluster {
    inner: InMemoryCluster,
    fs: Arc<dyn FileSystem>,
    overlay_path: Option<PathBuf>,
}

impl SimulatedCluster {
    pub fn new(fs: Arc<dyn FileSystem>, overlay_path: Option<PathBuf>) -> Self {
        Self {
            inner: InMemoryCluster::new(),
            fs,
            overlay_path,
        }
    }

    /// Handle to the underlying objects (without the overlay).
    pub fn inner(&self) -> &InMemoryCluster {
        &self.inner
    }

    fn load_overlay(&self) -> Result<LiveOverlay> {
        let Some(path) = self.overlay_path.as_deref() else {
            return Ok(LiveOverlay::default());
        };
        if !self.fs.exists(path) {
            trace!(?path, "no live overlay file");
            return Ok(LiveOverlay::default());
        }
        let text = self.fs.read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(LiveOverlay::default());
        }
        LiveOverlay::parse(&text)
    }
}

impl ClusterBackend for SimulatedCluster {
    fn apply(&self, resources: Vec<Resource>) -> BoxFuture<'_, Result<()>> {
        self.inner.apply(resources)
    }

    fn delete(&self, keys: Vec<ResourceKey>) -> BoxFuture<'_, Result<()>> {
        self.inner.delete(keys)
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<LiveSnapshot>> {
        Box::pin(async move {
            let overlay = self.load_overlay()?;
            Ok(overlay.apply_to(self.inner.snapshot_now()))
        })
    }
}
