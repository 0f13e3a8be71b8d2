// src/status/model.rs

use serde::{Deserialize, Serialize};

use crate::types::DispatchStage;

/// Overall application phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppPhase {
    /// Nothing has been applied yet.
    Rendering,
    /// Some component or trait is unhealthy or still pending.
    RunningWorkflow,
    /// Every component and trait is healthy and dispatched.
    Running,
}

impl std::fmt::Display for AppPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AppPhase::Rendering => "rendering",
            AppPhase::RunningWorkflow => "runningWorkflow",
            AppPhase::Running => "running",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitStatus {
    #[serde(rename = "type")]
    pub trait_type: String,
    pub stage: DispatchStage,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TraitStatus {
    pub fn pending(trait_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            stage: DispatchStage::PostDispatch,
            healthy: false,
            message: None,
            pending: true,
            reason: Some(reason.into()),
        }
    }

    /// Healthy and not waiting on anything.
    pub fn is_settled(&self) -> bool {
        self.healthy && !self.pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// In the order the traits are declared on the component.
    #[serde(default)]
    pub traits: Vec<TraitStatus>,
}

impl ComponentStatus {
    pub fn is_settled(&self) -> bool {
        self.healthy && self.traits.iter().all(TraitStatus::is_settled)
    }

    pub fn pending_traits(&self) -> impl Iterator<Item = &TraitStatus> {
        self.traits.iter().filter(|t| t.pending)
    }
}

/// Application status snapshot, consistent with one live read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub name: String,
    pub namespace: String,
    pub generation: u64,
    pub tick: u64,
    pub phase: AppPhase,
    /// Component statuses ordered by component name.
    pub services: Vec<ComponentStatus>,
}

impl AppStatus {
    pub fn service(&self, name: &str) -> Option<&ComponentStatus> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_camel_case_and_skips_empty() {
        let status = AppStatus {
            name: "demo".into(),
            namespace: "default".into(),
            generation: 1,
            tick: 4,
            phase: AppPhase::RunningWorkflow,
            services: vec![ComponentStatus {
                name: "express-server".into(),
                namespace: "default".into(),
                cluster: "local".into(),
                component_type: "webservice".into(),
                healthy: false,
                message: Some("Ready:0/3".into()),
                traits: vec![TraitStatus::pending(
                    "status-reporter",
                    "waiting for component to be healthy",
                )],
            }],
        };

        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["phase"], json!("runningWorkflow"));
        let t = &v["services"][0]["traits"][0];
        assert_eq!(t["type"], json!("status-reporter"));
        assert_eq!(t["stage"], json!("PostDispatch"));
        assert_eq!(t["pending"], json!(true));
        assert!(t.get("message").is_none());

        let back: AppStatus = serde_json::from_value(v).unwrap();
        assert_eq!(back, status);
    }
}
