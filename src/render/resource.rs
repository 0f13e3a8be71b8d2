// src/render/resource.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::render::RenderError;

pub const LABEL_APP: &str = "app.oam.dev/name";
pub const LABEL_COMPONENT: &str = "app.oam.dev/component";
pub const LABEL_TRAIT: &str = "trait.oam.dev/type";

/// Identity of a resource in a cluster: `cluster/namespace/Kind/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    pub cluster: String,
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cluster, self.namespace, self.kind, self.name
        )
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, '/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(ns), Some(k), Some(n)) if !c.is_empty() && !k.is_empty() && !n.is_empty() => {
                Ok(ResourceKey::new(c, ns, k, n))
            }
            _ => Err(format!(
                "invalid resource key '{s}' (expected cluster/namespace/Kind/name)"
            )),
        }
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(k: ResourceKey) -> Self {
        k.to_string()
    }
}

/// A rendered object bound for a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub key: ResourceKey,
    pub object: Value,
}

/// Where a rendered object came from; used for defaults and labels.
#[derive(Debug, Clone, Copy)]
pub struct Provenance<'a> {
    pub app: &'a str,
    pub component: &'a str,
    pub cluster: &'a str,
    pub namespace: &'a str,
    pub trait_type: Option<&'a str>,
}

impl Resource {
    /// Finish a rendered object: default the namespace, stamp ownership
    /// labels and derive the key.
    ///
    /// `what` names the template in error messages (`output`,
    /// `outputs.service`, ...).
    pub fn from_rendered(
        mut object: Value,
        origin: Provenance<'_>,
        what: &str,
    ) -> Result<Resource, RenderError> {
        let invalid = |msg: &str| RenderError::Invalid {
            path: what.to_string(),
            msg: msg.to_string(),
        };

        let root = object
            .as_object_mut()
            .ok_or_else(|| invalid("rendered resource is not an object"))?;

        let kind = match root.get("kind") {
            Some(Value::String(k)) if !k.is_empty() => k.clone(),
            _ => return Err(invalid("resource needs a string `kind`")),
        };

        let metadata = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| invalid("`metadata` must be an object"))?;

        let name = match metadata.get("name") {
            Some(Value::String(n)) if !n.is_empty() => n.clone(),
            _ => return Err(invalid("resource needs a string `metadata.name`")),
        };

        let explicit = match metadata.get("namespace") {
            Some(Value::String(ns)) if !ns.is_empty() => Some(ns.clone()),
            Some(Value::String(_)) | None => None,
            Some(_) => return Err(invalid("`metadata.namespace` must be a string")),
        };
        let namespace = match explicit {
            Some(ns) => ns,
            None => {
                metadata.insert("namespace".into(), Value::String(origin.namespace.to_string()));
                origin.namespace.to_string()
            }
        };

        let labels = metadata
            .entry("labels")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| invalid("`metadata.labels` must be an object"))?;
        labels.insert(LABEL_APP.into(), Value::String(origin.app.to_string()));
        labels.insert(LABEL_COMPONENT.into(), Value::String(origin.component.to_string()));
        if let Some(t) = origin.trait_type {
            labels.insert(LABEL_TRAIT.into(), Value::String(t.to_string()));
        }

        Ok(Resource {
            key: ResourceKey::new(origin.cluster, namespace, kind, name),
            object,
        })
    }
}

/// JSON merge patch: objects merge recursively, `null` deletes a field,
/// anything else replaces the target.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(
                    target_map.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> Provenance<'static> {
        Provenance {
            app: "demo",
            component: "express-server",
            cluster: "local",
            namespace: "default",
            trait_type: Some("status-reporter"),
        }
    }

    #[test]
    fn stamps_labels_and_default_namespace() {
        let obj = json!({ "kind": "ConfigMap", "metadata": { "name": "cm" } });
        let r = Resource::from_rendered(obj, origin(), "outputs.cm").unwrap();
        assert_eq!(r.key.to_string(), "local/default/ConfigMap/cm");
        assert_eq!(r.object["metadata"]["namespace"], json!("default"));
        assert_eq!(r.object["metadata"]["labels"][LABEL_COMPONENT], json!("express-server"));
        assert_eq!(r.object["metadata"]["labels"][LABEL_TRAIT], json!("status-reporter"));
    }

    #[test]
    fn keeps_explicit_namespace() {
        let obj = json!({ "kind": "Service", "metadata": { "name": "s", "namespace": "edge" } });
        let r = Resource::from_rendered(obj, origin(), "output").unwrap();
        assert_eq!(r.key.namespace, "edge");
    }

    #[test]
    fn rejects_missing_kind_or_name() {
        let err = Resource::from_rendered(json!({ "metadata": { "name": "x" } }), origin(), "output")
            .unwrap_err();
        assert!(err.to_string().contains("kind"));
        let err = Resource::from_rendered(json!({ "kind": "Pod" }), origin(), "output").unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn key_parses_back() {
        let k: ResourceKey = "local/default/Deployment/web".parse().unwrap();
        assert_eq!(k, ResourceKey::new("local", "default", "Deployment", "web"));
        assert!("local/Deployment".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn merge_patch_semantics() {
        let mut target = json!({ "spec": { "replicas": 1, "paused": true }, "metadata": { "name": "a" } });
        merge_patch(
            &mut target,
            &json!({ "spec": { "replicas": 3, "paused": null }, "metadata": { "labels": { "x": "y" } } }),
        );
        assert_eq!(
            target,
            json!({ "spec": { "replicas": 3 }, "metadata": { "name": "a", "labels": { "x": "y" } } })
        );
    }
}
