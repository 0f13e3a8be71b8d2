use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use vela_dispatch::cluster::{BoxFuture, ClusterBackend, InMemoryCluster, LiveSnapshot};
use vela_dispatch::errors::{DispatchError, Result};
use vela_dispatch::render::{Resource, ResourceKey};

/// One call made against the cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOp {
    Apply(Vec<ResourceKey>),
    Delete(Vec<ResourceKey>),
}

#[derive(Debug, Default)]
struct State {
    ops: Vec<ClusterOp>,
    /// Status written onto a key as soon as it is applied, standing in for a
    /// controller that reconciles the object.
    status_on_apply: BTreeMap<ResourceKey, Value>,
    fail_applies: usize,
    fail_deletes: usize,
    fail_snapshots: usize,
}

/// A cluster backend that:
/// - stores objects in an [`InMemoryCluster`]
/// - records every apply / delete
/// - can fail the next N calls of each kind
///
/// Clones share state, so a test can keep a handle after moving one into a
/// `Runtime`.
#[derive(Debug, Clone, Default)]
pub struct RecordingCluster {
    inner: InMemoryCluster,
    state: Arc<Mutex<State>>,
}

impl RecordingCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn inner(&self) -> &InMemoryCluster {
        &self.inner
    }

    pub fn ops(&self) -> Vec<ClusterOp> {
        self.state().ops.clone()
    }

    /// Every key ever applied, in order, with repeats.
    pub fn applied_keys(&self) -> Vec<ResourceKey> {
        self.state()
            .ops
            .iter()
            .filter_map(|op| match op {
                ClusterOp::Apply(keys) => Some(keys.clone()),
                ClusterOp::Delete(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn deleted_keys(&self) -> Vec<ResourceKey> {
        self.state()
            .ops
            .iter()
            .filter_map(|op| match op {
                ClusterOp::Delete(keys) => Some(keys.clone()),
                ClusterOp::Apply(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn set_status_on_apply(&self, key: ResourceKey, status: Value) {
        self.state().status_on_apply.insert(key, status);
    }

    pub fn fail_next_applies(&self, n: usize) {
        self.state().fail_applies = n;
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.state().fail_deletes = n;
    }

    pub fn fail_next_snapshots(&self, n: usize) {
        self.state().fail_snapshots = n;
    }

    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

fn injected(what: &str) -> DispatchError {
    DispatchError::Other(anyhow::anyhow!("injected {what} failure"))
}

impl ClusterBackend for RecordingCluster {
    fn apply(&self, resources: Vec<Resource>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let statuses = {
                let mut state = self.state();
                if Self::take_failure(&mut state.fail_applies) {
                    return Err(injected("apply"));
                }
                state
                    .ops
                    .push(ClusterOp::Apply(resources.iter().map(|r| r.key.clone()).collect()));
                resources
                    .iter()
                    .filter_map(|r| {
                        state
                            .status_on_apply
                            .get(&r.key)
                            .map(|s| (r.key.clone(), s.clone()))
                    })
                    .collect::<Vec<_>>()
            };
            self.inner.apply_now(resources);
            for (key, status) in statuses {
                self.inner.set_status(&key, status);
            }
            Ok(())
        })
    }

    fn delete(&self, keys: Vec<ResourceKey>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            {
                let mut state = self.state();
                if Self::take_failure(&mut state.fail_deletes) {
                    return Err(injected("delete"));
                }
                state.ops.push(ClusterOp::Delete(keys.clone()));
            }
            self.inner.delete_now(keys);
            Ok(())
        })
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<LiveSnapshot>> {
        Box::pin(async move {
            if Self::take_failure(&mut self.state().fail_snapshots) {
                return Err(injected("snapshot"));
            }
            Ok(self.inner.snapshot_now())
        })
    }
}
