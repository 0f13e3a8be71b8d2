#![allow(dead_code)]

use std::collections::BTreeMap;

use serde_json::{json, Value};
use vela_dispatch::config::{
    ApplicationSection, ComponentConfig, ComponentDefinition, ConfigFile, ConfigSection,
    RawConfigFile, TraitConfig, TraitDefinition,
};
use vela_dispatch::errors::Result;
use vela_dispatch::types::DispatchStage;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(app: &str) -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                application: ApplicationSection {
                    name: app.to_string(),
                    ..ApplicationSection::default()
                },
                component_definition: BTreeMap::new(),
                trait_definition: BTreeMap::new(),
                component: BTreeMap::new(),
            },
        }
    }

    pub fn namespace(mut self, ns: &str) -> Self {
        self.config.application.namespace = ns.to_string();
        self
    }

    pub fn reconcile_interval(mut self, interval: &str) -> Self {
        self.config.config.reconcile_interval = interval.to_string();
        self
    }

    pub fn max_backoff(mut self, max: &str) -> Self {
        self.config.config.max_backoff = max.to_string();
        self
    }

    pub fn pending_warn_after(mut self, ticks: u64) -> Self {
        self.config.config.pending_warn_after = ticks;
        self
    }

    pub fn component_definition(mut self, name: &str, def: ComponentDefinition) -> Self {
        self.config.component_definition.insert(name.to_string(), def);
        self
    }

    pub fn trait_definition(mut self, name: &str, def: TraitDefinition) -> Self {
        self.config.trait_definition.insert(name.to_string(), def);
        self
    }

    pub fn component(mut self, name: &str, component: ComponentConfig) -> Self {
        self.config.component.insert(name.to_string(), component);
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build valid config from builder")
    }
}

/// Builder for `ComponentDefinition`.
pub struct ComponentDefinitionBuilder {
    def: ComponentDefinition,
}

impl ComponentDefinitionBuilder {
    pub fn new(output: Value) -> Self {
        Self {
            def: ComponentDefinition {
                description: None,
                output,
                outputs: BTreeMap::new(),
                health_policy: None,
                custom_status: None,
            },
        }
    }

    pub fn output(mut self, name: &str, template: Value) -> Self {
        self.def.outputs.insert(name.to_string(), template);
        self
    }

    pub fn health_policy(mut self, program: &str) -> Self {
        self.def.health_policy = Some(program.to_string());
        self
    }

    pub fn custom_status(mut self, program: &str) -> Self {
        self.def.custom_status = Some(program.to_string());
        self
    }

    pub fn build(self) -> ComponentDefinition {
        self.def
    }
}

/// Builder for `TraitDefinition`.
pub struct TraitDefinitionBuilder {
    def: TraitDefinition,
}

impl TraitDefinitionBuilder {
    pub fn new(stage: DispatchStage) -> Self {
        Self {
            def: TraitDefinition {
                description: None,
                stage,
                patch: None,
                outputs: BTreeMap::new(),
                health_policy: None,
                custom_status: None,
            },
        }
    }

    pub fn patch(mut self, template: Value) -> Self {
        self.def.patch = Some(template);
        self
    }

    pub fn output(mut self, name: &str, template: Value) -> Self {
        self.def.outputs.insert(name.to_string(), template);
        self
    }

    pub fn health_policy(mut self, program: &str) -> Self {
        self.def.health_policy = Some(program.to_string());
        self
    }

    pub fn custom_status(mut self, program: &str) -> Self {
        self.def.custom_status = Some(program.to_string());
        self
    }

    pub fn build(self) -> TraitDefinition {
        self.def
    }
}

/// Builder for `ComponentConfig`.
pub struct ComponentBuilder {
    component: ComponentConfig,
}

impl ComponentBuilder {
    pub fn new(component_type: &str) -> Self {
        Self {
            component: ComponentConfig {
                component_type: component_type.to_string(),
                cluster: None,
                namespace: None,
                properties: json!({}),
                traits: Vec::new(),
            },
        }
    }

    pub fn properties(mut self, properties: Value) -> Self {
        self.component.properties = properties;
        self
    }

    pub fn cluster(mut self, cluster: &str) -> Self {
        self.component.cluster = Some(cluster.to_string());
        self
    }

    pub fn namespace(mut self, ns: &str) -> Self {
        self.component.namespace = Some(ns.to_string());
        self
    }

    pub fn with_trait(mut self, trait_type: &str, properties: Value) -> Self {
        self.component.traits.push(TraitConfig {
            trait_type: trait_type.to_string(),
            properties,
        });
        self
    }

    pub fn build(self) -> ComponentConfig {
        self.component
    }
}

/// `webservice`: a Deployment judged healthy once `readyReplicas` matches
/// `spec.replicas`.
pub fn webservice() -> ComponentDefinition {
    ComponentDefinitionBuilder::new(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "${context.name}" },
        "spec": {
            "replicas": "${parameter.replicas}",
            "template": { "spec": { "containers": [{ "name": "${context.name}", "image": "${parameter.image}" }] } }
        }
    }))
    .health_policy("isHealth: context.output.status.readyReplicas == context.output.spec.replicas")
    .custom_status(
        r#"message: "Ready:\(context.output.status.readyReplicas)/\(context.output.spec.replicas)""#,
    )
    .build()
}

/// `status-reporter`: PostDispatch trait copying the workload's live replica
/// counts into a ConfigMap.
pub fn status_reporter() -> TraitDefinition {
    TraitDefinitionBuilder::new(DispatchStage::PostDispatch)
        .output(
            "statusConfigMap",
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "${context.name}-status" },
                "data": {
                    "replicas": "${context.output.status.replicas}",
                    "readyReplicas": "${context.output.status.readyReplicas}"
                }
            }),
        )
        .health_policy(
            "isHealth: context.outputs.statusConfigMap.data.readyReplicas == context.output.status.readyReplicas",
        )
        .build()
}

/// `scaler`: default-stage trait patching `spec.replicas`.
pub fn scaler() -> TraitDefinition {
    TraitDefinitionBuilder::new(DispatchStage::Default)
        .patch(json!({ "spec": { "replicas": "${parameter.replicas}" } }))
        .build()
}

/// `labels`: default-stage trait merging extra labels into the workload.
pub fn labels() -> TraitDefinition {
    TraitDefinitionBuilder::new(DispatchStage::Default)
        .patch(json!({ "metadata": { "labels": "${parameter}" } }))
        .build()
}

/// The `express-server` application: a webservice with a PostDispatch
/// `status-reporter` trait, ticking every 10ms.
pub fn express_server_app(replicas: i64) -> ConfigFileBuilder {
    ConfigFileBuilder::new("express-app")
        .reconcile_interval("10ms")
        .max_backoff("40ms")
        .component_definition("webservice", webservice())
        .trait_definition("status-reporter", status_reporter())
        .trait_definition("scaler", scaler())
        .trait_definition("labels", labels())
        .component(
            "express-server",
            ComponentBuilder::new("webservice")
                .properties(json!({ "image": "oamdev/hello-world:v1", "replicas": replicas }))
                .with_trait("status-reporter", json!({}))
                .build(),
        )
}
