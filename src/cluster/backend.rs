// src/cluster/backend.rs

//! Pluggable cluster backend abstraction.
//!
//! The runtime talks to a `ClusterBackend` instead of a concrete API client,
//! so tests can swap in an in-memory or recording backend.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::errors::Result;
use crate::render::{Resource, ResourceKey};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Live objects as read in one consistent pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSnapshot {
    objects: BTreeMap<ResourceKey, Value>,
}

impl LiveSnapshot {
    pub fn new(objects: BTreeMap<ResourceKey, Value>) -> Self {
        Self { objects }
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&Value> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.objects.contains_key(key)
    }

    /// True when every key is present.
    pub fn contains_all<'a>(&self, mut keys: impl Iterator<Item = &'a ResourceKey>) -> bool {
        keys.all(|k| self.contains(k))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.objects.keys()
    }

    pub fn into_inner(self) -> BTreeMap<ResourceKey, Value> {
        self.objects
    }
}

/// Where rendered resources go and live state comes from.
pub trait ClusterBackend: Send + Sync {
    /// Create or update resources. The cluster keeps ownership of each
    /// object's `status`.
    fn apply(&self, resources: Vec<Resource>) -> BoxFuture<'_, Result<()>>;

    /// Delete resources; unknown keys are ignored.
    fn delete(&self, keys: Vec<ResourceKey>) -> BoxFuture<'_, Result<()>>;

    /// Read every live object once.
    fn snapshot(&self) -> BoxFuture<'_, Result<LiveSnapshot>>;
}
