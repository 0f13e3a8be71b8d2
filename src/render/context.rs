// src/render/context.rs

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::config::{ComponentConfig, ConfigFile};
use crate::render::resource::Provenance;

/// Identity of one component instance for a given manifest generation.
///
/// Produces the `{ context, parameter }` scope that templates and health
/// programs are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderMeta {
    pub app_name: String,
    pub generation: u64,
    pub component: String,
    pub namespace: String,
    pub cluster: String,
}

impl RenderMeta {
    pub fn for_component(
        cfg: &ConfigFile,
        name: &str,
        component: &ComponentConfig,
        generation: u64,
    ) -> Self {
        Self {
            app_name: cfg.application.name.clone(),
            generation,
            component: name.to_string(),
            namespace: component.effective_namespace(&cfg.application).to_string(),
            cluster: component.effective_cluster().to_string(),
        }
    }

    /// `<app>-v<generation>`
    pub fn app_revision(&self) -> String {
        format!("{}-v{}", self.app_name, self.generation)
    }

    pub fn provenance<'a>(&'a self, trait_type: Option<&'a str>) -> Provenance<'a> {
        Provenance {
            app: &self.app_name,
            component: &self.component,
            cluster: &self.cluster,
            namespace: &self.namespace,
            trait_type,
        }
    }

    /// Build the evaluation scope.
    ///
    /// `output` is left out of `context` entirely when `None`, so programs
    /// see it as absent rather than `null`.
    pub fn scope(
        &self,
        parameter: &Value,
        output: Option<&Value>,
        outputs: &BTreeMap<String, Value>,
    ) -> Value {
        let mut context = Map::new();
        context.insert("name".into(), json!(self.component));
        context.insert("namespace".into(), json!(self.namespace));
        context.insert("cluster".into(), json!(self.cluster));
        context.insert("appName".into(), json!(self.app_name));
        context.insert("appRevision".into(), json!(self.app_revision()));
        if let Some(out) = output {
            context.insert("output".into(), out.clone());
        }
        let outputs: Map<String, Value> = outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        context.insert("outputs".into(), Value::Object(outputs));

        json!({
            "context": Value::Object(context),
            "parameter": parameter.clone(),
        })
    }
}
