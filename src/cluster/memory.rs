// src/cluster/memory.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::debug;

use crate::cluster::backend::{BoxFuture, ClusterBackend, LiveSnapshot};
use crate::errors::Result;
use crate::render::{merge_patch, Resource, ResourceKey};

/// Shared in-memory cluster.
///
/// Clones share state, so a test can keep a handle and act as the workload
/// controller (`set_status`, `patch`) while the runtime applies through
/// another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    objects: Arc<Mutex<BTreeMap<ResourceKey, Value>>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<ResourceKey, Value>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply synchronously. An existing object's `status` survives; the
    /// desired object never carries one.
    pub fn apply_now(&self, resources: impl IntoIterator<Item = Resource>) {
        let mut objects = self.objects();
        for Resource { key, mut object } in resources {
            let live_status = objects
                .get(&key)
                .and_then(|live| live.get("status"))
                .cloned();
            if let Some(obj) = object.as_object_mut() {
                obj.remove("status");
                if let Some(status) = live_status {
                    obj.insert("status".into(), status);
                }
            }
            debug!(key = %key, "applied");
            objects.insert(key, object);
        }
    }

    pub fn delete_now(&self, keys: impl IntoIterator<Item = ResourceKey>) {
        let mut objects = self.objects();
        for key in keys {
            if objects.remove(&key).is_some() {
                debug!(key = %key, "deleted");
            }
        }
    }

    pub fn snapshot_now(&self) -> LiveSnapshot {
        LiveSnapshot::new(self.objects().clone())
    }

    pub fn get(&self, key: &ResourceKey) -> Option<Value> {
        self.objects().get(key).cloned()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.objects().contains_key(key)
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.objects().keys().cloned().collect()
    }

    /// Replace the `status` of an existing object. Returns false if the
    /// object does not exist.
    pub fn set_status(&self, key: &ResourceKey, status: Value) -> bool {
        match self.objects().get_mut(key).and_then(Value::as_object_mut) {
            Some(obj) => {
                obj.insert("status".into(), status);
                true
            }
            None => false,
        }
    }

    /// Merge-patch an existing object. Returns false if it does not exist.
    pub fn patch(&self, key: &ResourceKey, patch: &Value) -> bool {
        match self.objects().get_mut(key) {
            Some(obj) => {
                merge_patch(obj, patch);
                true
            }
            None => false,
        }
    }
}

impl ClusterBackend for InMemoryCluster {
    fn apply(&self, resources: Vec<Resource>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.apply_now(resources);
            Ok(())
        })
    }

    fn delete(&self, keys: Vec<ResourceKey>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.delete_now(keys);
            Ok(())
        })
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<LiveSnapshot>> {
        Box::pin(async move { Ok(self.snapshot_now()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment(replicas: i64) -> Resource {
        Resource {
            key: ResourceKey::new("local", "default", "Deployment", "web"),
            object: json!({
                "kind": "Deployment",
                "metadata": { "name": "web", "namespace": "default" },
                "spec": { "replicas": replicas }
            }),
        }
    }

    #[test]
    fn apply_preserves_live_status() {
        let cluster = InMemoryCluster::new();
        let key = deployment(1).key;
        cluster.apply_now([deployment(1)]);
        assert!(cluster.set_status(&key, json!({ "readyReplicas": 1 })));

        cluster.apply_now([deployment(3)]);
        let live = cluster.get(&key).unwrap();
        assert_eq!(live["spec"]["replicas"], json!(3));
        assert_eq!(live["status"]["readyReplicas"], json!(1));
    }

    #[test]
    fn patch_and_delete() {
        let cluster = InMemoryCluster::new();
        let key = deployment(1).key;
        assert!(!cluster.patch(&key, &json!({ "status": {} })));

        cluster.apply_now([deployment(1)]);
        assert!(cluster.patch(&key, &json!({ "status": { "replicas": 1 } })));
        assert_eq!(cluster.snapshot_now().get(&key).unwrap()["status"]["replicas"], json!(1));

        cluster.delete_now([key.clone()]);
        assert!(!cluster.contains(&key));
    }

    #[tokio::test]
    async fn trait_methods_share_state() {
        let cluster = InMemoryCluster::new();
        let handle = cluster.clone();
        cluster.apply(vec![deployment(2)]).await.unwrap();
        assert_eq!(handle.keys().len(), 1);
        let snap = cluster.snapshot().await.unwrap();
        assert_eq!(snap.len(), 1);
        cluster.delete(handle.keys()).await.unwrap();
        assert!(cluster.snapshot().await.unwrap().is_empty());
    }
}
