use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical component name type used throughout the engine.
pub type ComponentName = String;

/// When a trait is rendered relative to its component's health.
///
/// - `Default`: rendered in the same pass as the component, against the
///   component's declared output. Spelled `"default"` or `"PreDispatch"` in
///   manifests, or simply omitted.
/// - `PostDispatch`: held until the component is healthy, then rendered
///   against the component's live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DispatchStage {
    #[default]
    #[serde(rename = "default", alias = "PreDispatch", alias = "Default")]
    Default,
    #[serde(rename = "PostDispatch", alias = "postDispatch")]
    PostDispatch,
}

impl DispatchStage {
    pub fn is_post_dispatch(self) -> bool {
        matches!(self, DispatchStage::PostDispatch)
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStage::Default => f.write_str("default"),
            DispatchStage::PostDispatch => f.write_str("PostDispatch"),
        }
    }
}

impl FromStr for DispatchStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "default" | "Default" | "PreDispatch" => Ok(DispatchStage::Default),
            "PostDispatch" | "postDispatch" => Ok(DispatchStage::PostDispatch),
            other => Err(format!(
                "invalid trait stage: {other} (expected \"PostDispatch\" or \"PreDispatch\")"
            )),
        }
    }
}

/// Identity of a trait instance: the owning component plus the trait type.
///
/// A component may carry each trait type at most once, so this pair is
/// unique within an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraitId {
    pub component: ComponentName,
    pub trait_type: String,
}

impl TraitId {
    pub fn new(component: impl Into<String>, trait_type: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            trait_type: trait_type.into(),
        }
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.trait_type)
    }
}
