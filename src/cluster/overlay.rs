// src/cluster/overlay.rs

//! Externally supplied live-state fields.
//!
//! An overlay file maps resource keys to fields that are merged into the live
//! objects, standing in for workload controllers:
//!
//! ```json
//! {
//!   "local/default/Deployment/express-server": {
//!     "status": { "readyReplicas": 1, "replicas": 1 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::cluster::backend::LiveSnapshot;
use crate::errors::Result;
use crate::render::{merge_patch, ResourceKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveOverlay {
    fields: BTreeMap<ResourceKey, Value>,
}

impl LiveOverlay {
    pub fn parse(src: &str) -> Result<Self> {
        let fields: BTreeMap<ResourceKey, Value> = serde_json::from_str(src)?;
        Ok(Self { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge overlay fields into objects that exist in `snapshot`. Entries
    /// for objects that were never applied are ignored.
    pub fn apply_to(&self, snapshot: LiveSnapshot) -> LiveSnapshot {
        let mut objects = snapshot.into_inner();
        for (key, fields) in &self.fields {
            match objects.get_mut(key) {
                Some(object) => merge_patch(object, fields),
                None => debug!(key = %key, "overlay entry for missing object ignored"),
            }
        }
        LiveSnapshot::new(objects)
    }
}
