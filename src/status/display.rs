// src/status/display.rs

//! Human-readable status view.
//!
//! ```text
//! demo (default) generation 1, tick 4: runningWorkflow
//!   express-server  webservice  local/default  Health: ❌  Ready:0/3
//!     status-reporter  PostDispatch  Health: ❌  Pending: true  waiting for component to be healthy
//! ```

use std::fmt;

use crate::status::model::{AppStatus, ComponentStatus, TraitStatus};

fn health_mark(healthy: bool) -> &'static str {
    if healthy { "✅" } else { "❌" }
}

impl fmt::Display for TraitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  Health: {}",
            self.trait_type,
            self.stage,
            health_mark(self.healthy)
        )?;
        if self.pending {
            f.write_str("  Pending: true")?;
            if let Some(reason) = &self.reason {
                write!(f, "  {reason}")?;
            }
        }
        if let Some(msg) = &self.message {
            write!(f, "  {msg}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  {}/{}  Health: {}",
            self.name,
            self.component_type,
            self.cluster,
            self.namespace,
            health_mark(self.healthy)
        )?;
        if let Some(msg) = &self.message {
            write!(f, "  {msg}")?;
        }
        for t in &self.traits {
            write!(f, "\n    {t}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) generation {}, tick {}: {}",
            self.name, self.namespace, self.generation, self.tick, self.phase
        )?;
        for svc in &self.services {
            write!(f, "\n  {svc}")?;
        }
        Ok(())
    }
}
