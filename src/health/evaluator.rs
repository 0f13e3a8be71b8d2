// src/health/evaluator.rs

use serde_json::Value;
use tracing::trace;

use crate::expr::{display_value, Program, Val};

/// Outcome of judging one component or trait.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthResult {
    pub healthy: bool,
    /// Rendered `custom_status` message, if any.
    pub message: Option<String>,
    /// Why evaluation itself failed. Takes precedence over `message` in
    /// status output.
    pub diagnostic: Option<String>,
}

impl HealthResult {
    /// Message to surface in status.
    pub fn status_message(&self) -> Option<&str> {
        self.diagnostic.as_deref().or(self.message.as_deref())
    }

    fn unhealthy(diagnostic: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: None,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Health policy and custom status programs of one definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSpec<'a> {
    pub health_policy: Option<&'a str>,
    pub custom_status: Option<&'a str>,
}

/// Judge an entity from a read-only scope.
///
/// `applied` says whether every resource the entity owns is present in the
/// live snapshot; nothing is healthy before that. Without a health policy an
/// applied entity is healthy.
pub fn evaluate(spec: HealthSpec<'_>, scope: &Value, applied: bool) -> HealthResult {
    let mut result = HealthResult {
        healthy: applied,
        ..HealthResult::default()
    };

    if let Some(src) = spec.health_policy {
        match eval_policy(src, scope) {
            Ok(policy) => result.healthy = applied && policy,
            Err(diag) => return HealthResult::unhealthy(format!("health policy: {diag}")),
        }
    }

    if let Some(src) = spec.custom_status {
        match eval_message(src, scope) {
            Ok(message) => result.message = message,
            Err(diag) => {
                result.healthy = false;
                result.diagnostic = Some(format!("custom status: {diag}"));
            }
        }
    }

    trace!(
        healthy = result.healthy,
        applied,
        message = ?result.message,
        diagnostic = ?result.diagnostic,
        "health evaluated"
    );
    result
}

fn eval_policy(src: &str, scope: &Value) -> Result<bool, String> {
    let program = Program::parse(src).map_err(|e| e.to_string())?;
    if !program.binds("isHealth") {
        return Err("`isHealth` is not defined".to_string());
    }
    let bindings = program.evaluate(scope).map_err(|e| e.to_string())?;
    match bindings.get("isHealth") {
        Some(Val::Value(Value::Bool(b))) => Ok(*b),
        // Not observable yet.
        Some(Val::Absent) | None => Ok(false),
        Some(Val::Value(other)) => Err(format!(
            "`isHealth` must be a bool, got {}",
            display_value(other)
        )),
    }
}

fn eval_message(src: &str, scope: &Value) -> Result<Option<String>, String> {
    let program = Program::parse(src).map_err(|e| e.to_string())?;
    if !program.binds("message") {
        return Err("`message` is not defined".to_string());
    }
    let bindings = program.evaluate(scope).map_err(|e| e.to_string())?;
    Ok(match bindings.get("message") {
        Some(Val::Value(v)) => Some(display_value(v)),
        Some(Val::Absent) | None => None,
    })
}
