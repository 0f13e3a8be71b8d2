// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ComponentName, DispatchStage};

/// Cluster used when a component does not name one.
pub const DEFAULT_CLUSTER: &str = "local";

/// Top-level manifest as read from a TOML file.
///
/// ```toml
/// [config]
/// reconcile_interval = "2s"
///
/// [application]
/// name = "demo"
///
/// [component_definition.webservice]
/// health_policy = "isHealth: context.output.status.readyReplicas > 0"
/// [component_definition.webservice.output]
/// kind = "Deployment"
/// metadata = { name = "${context.name}" }
///
/// [component.frontend]
/// type = "webservice"
/// ```
///
/// This is the unvalidated form; use [`ConfigFile`] (via `TryFrom`) everywhere
/// else.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Engine behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Application identity from `[application]`.
    #[serde(default)]
    pub application: ApplicationSection,

    /// Component types from `[component_definition.<type>]`.
    #[serde(default)]
    pub component_definition: BTreeMap<String, ComponentDefinition>,

    /// Trait types from `[trait_definition.<type>]`.
    #[serde(default)]
    pub trait_definition: BTreeMap<String, TraitDefinition>,

    /// Component instances from `[component.<name>]`.
    #[serde(default)]
    pub component: BTreeMap<ComponentName, ComponentConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Delay between reconcile ticks, e.g. `"2s"` or `"500ms"`.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval: String,

    /// Upper bound for the error backoff.
    #[serde(default = "default_max_backoff")]
    pub max_backoff: String,

    /// Number of ticks a PostDispatch trait may stay pending before a warning
    /// is logged.
    #[serde(default = "default_pending_warn_after")]
    pub pending_warn_after: u64,
}

fn default_reconcile_interval() -> String {
    "2s".to_string()
}

fn default_max_backoff() -> String {
    "30s".to_string()
}

fn default_pending_warn_after() -> u64 {
    30
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            reconcile_interval: default_reconcile_interval(),
            max_backoff: default_max_backoff(),
            pending_warn_after: default_pending_warn_after(),
        }
    }
}

/// `[application]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSection {
    #[serde(default)]
    pub name: String,

    /// Namespace used by components that do not set their own.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for ApplicationSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: default_namespace(),
        }
    }
}

/// `[component_definition.<type>]` section: how a component type renders and
/// how its health is judged.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentDefinition {
    #[serde(default)]
    pub description: Option<String>,

    /// Template of the primary output (the workload).
    pub output: Value,

    /// Templates of named auxiliary outputs.
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,

    /// Program binding `isHealth`.
    #[serde(default)]
    pub health_policy: Option<String>,

    /// Program binding `message`.
    #[serde(default)]
    pub custom_status: Option<String>,
}

/// `[trait_definition.<type>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TraitDefinition {
    #[serde(default)]
    pub description: Option<String>,

    /// Dispatch stage; omitted means the default stage.
    #[serde(default)]
    pub stage: DispatchStage,

    /// Template merged into the component's primary output (default stage
    /// only).
    #[serde(default)]
    pub patch: Option<Value>,

    /// Templates of the trait's own named outputs.
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,

    #[serde(default)]
    pub health_policy: Option<String>,

    #[serde(default)]
    pub custom_status: Option<String>,
}

/// `[component.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig {
    /// Name of a `[component_definition.<type>]`.
    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default)]
    pub cluster: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    /// Parameter values, exposed to templates as `parameter`.
    #[serde(default = "empty_object")]
    pub properties: Value,

    /// Attached traits, in declaration order.
    #[serde(default)]
    pub traits: Vec<TraitConfig>,
}

impl ComponentConfig {
    pub fn effective_cluster(&self) -> &str {
        self.cluster.as_deref().unwrap_or(DEFAULT_CLUSTER)
    }

    pub fn effective_namespace<'a>(&'a self, app: &'a ApplicationSection) -> &'a str {
        self.namespace.as_deref().unwrap_or(&app.namespace)
    }
}

/// `[[component.<name>.traits]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TraitConfig {
    /// Name of a `[trait_definition.<type>]`.
    #[serde(rename = "type")]
    pub trait_type: String,

    #[serde(default = "empty_object")]
    pub properties: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Engine settings with durations already parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub reconcile_interval: Duration,
    pub max_backoff: Duration,
    pub pending_warn_after: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            pending_warn_after: default_pending_warn_after(),
        }
    }
}

/// Validated manifest.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so every component and
/// trait refers to a known definition.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: EngineSettings,
    pub application: ApplicationSection,
    pub component_definition: BTreeMap<String, ComponentDefinition>,
    pub trait_definition: BTreeMap<String, TraitDefinition>,
    pub component: BTreeMap<ComponentName, ComponentConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: EngineSettings, raw: RawConfigFile) -> Self {
        Self {
            settings,
            application: raw.application,
            component_definition: raw.component_definition,
            trait_definition: raw.trait_definition,
            component: raw.component,
        }
    }

    pub fn definition_of(&self, component: &ComponentConfig) -> Option<&ComponentDefinition> {
        self.component_definition.get(&component.component_type)
    }

    pub fn trait_definition_of(&self, t: &TraitConfig) -> Option<&TraitDefinition> {
        self.trait_definition.get(&t.trait_type)
    }

    /// Stage of an attached trait; unknown types fall back to the default
    /// stage (cannot happen after validation).
    pub fn stage_of(&self, t: &TraitConfig) -> DispatchStage {
        self.trait_definition_of(t)
            .map(|d| d.stage)
            .unwrap_or_default()
    }
}

/// Upper bound for `reconcile_interval` and `max_backoff`.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse a duration string like `"500ms"`, `"3s"`, `"1m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| "duration too large".to_string()),
        "h" => value
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .ok_or_else(|| "duration too large".to_string()),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
