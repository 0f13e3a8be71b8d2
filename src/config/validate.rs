// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{
    parse_duration, ConfigFile, EngineSettings, RawConfigFile, MAX_TICK_INTERVAL,
};
use crate::errors::{DispatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DispatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let settings = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(settings, raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<EngineSettings> {
    ensure_has_components(cfg)?;
    validate_application(cfg)?;
    let settings = validate_engine_settings(cfg)?;
    validate_trait_definitions(cfg)?;
    validate_components(cfg)?;
    Ok(settings)
}

fn config_error(msg: impl Into<String>) -> DispatchError {
    DispatchError::ConfigError(msg.into())
}

fn ensure_has_components(cfg: &RawConfigFile) -> Result<()> {
    if cfg.component.is_empty() {
        return Err(config_error(
            "manifest must contain at least one [component.<name>] section",
        ));
    }
    Ok(())
}

fn validate_application(cfg: &RawConfigFile) -> Result<()> {
    if cfg.application.name.trim().is_empty() {
        return Err(config_error("[application].name must not be empty"));
    }
    if cfg.application.namespace.trim().is_empty() {
        return Err(config_error("[application].namespace must not be empty"));
    }
    Ok(())
}

fn validate_engine_settings(cfg: &RawConfigFile) -> Result<EngineSettings> {
    let reconcile_interval = parse_duration(&cfg.config.reconcile_interval)
        .map_err(|e| config_error(format!("[config].reconcile_interval: {e}")))?;
    let max_backoff = parse_duration(&cfg.config.max_backoff)
        .map_err(|e| config_error(format!("[config].max_backoff: {e}")))?;

    if reconcile_interval.is_zero() {
        return Err(config_error("[config].reconcile_interval must be > 0"));
    }
    if max_backoff > MAX_TICK_INTERVAL {
        return Err(config_error(format!(
            "[config].max_backoff ({}) must be <= {:?}",
            cfg.config.max_backoff, MAX_TICK_INTERVAL
        )));
    }
    if max_backoff < reconcile_interval {
        return Err(config_error(format!(
            "[config].max_backoff ({}) must be >= reconcile_interval ({})",
            cfg.config.max_backoff, cfg.config.reconcile_interval
        )));
    }
    if cfg.config.pending_warn_after == 0 {
        return Err(config_error(
            "[config].pending_warn_after must be >= 1 (got 0)",
        ));
    }

    Ok(EngineSettings {
        reconcile_interval,
        max_backoff,
        pending_warn_after: cfg.config.pending_warn_after,
    })
}

fn validate_trait_definitions(cfg: &RawConfigFile) -> Result<()> {
    for (name, def) in cfg.trait_definition.iter() {
        // The live workload is read-only for traits that see it.
        if def.stage.is_post_dispatch() && def.patch.is_some() {
            return Err(config_error(format!(
                "trait definition '{}' is PostDispatch and cannot declare a `patch`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_components(cfg: &RawConfigFile) -> Result<()> {
    for (name, comp) in cfg.component.iter() {
        if name.trim().is_empty() {
            return Err(config_error("component names must not be empty"));
        }

        if !cfg.component_definition.contains_key(&comp.component_type) {
            return Err(config_error(format!(
                "component '{}' has unknown type '{}'",
                name, comp.component_type
            )));
        }

        if let Some(cluster) = comp.cluster.as_deref() {
            if cluster.trim().is_empty() {
                return Err(config_error(format!(
                    "component '{}' has an empty `cluster`",
                    name
                )));
            }
        }

        if !comp.properties.is_object() {
            return Err(config_error(format!(
                "component '{}' has non-table `properties`",
                name
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for t in comp.traits.iter() {
            if !cfg.trait_definition.contains_key(&t.trait_type) {
                return Err(config_error(format!(
                    "component '{}' has unknown trait type '{}'",
                    name, t.trait_type
                )));
            }
            if !seen.insert(t.trait_type.as_str()) {
                return Err(config_error(format!(
                    "component '{}' attaches trait '{}' more than once",
                    name, t.trait_type
                )));
            }
            if !t.properties.is_object() {
                return Err(config_error(format!(
                    "trait '{}' on component '{}' has non-table `properties`",
                    t.trait_type, name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    const BASE: &str = r#"
[application]
name = "demo"

[component_definition.worker]
output = { kind = "Deployment", metadata = { name = "${context.name}" } }

[trait_definition.gate]
stage = "PostDispatch"
"#;

    #[test]
    fn accepts_minimal_manifest() {
        let cfg = parse(&format!(
            "{BASE}\n[component.a]\ntype = \"worker\"\n[[component.a.traits]]\ntype = \"gate\"\n"
        ))
        .unwrap();
        assert_eq!(cfg.settings, EngineSettings::default());
        assert_eq!(cfg.component.len(), 1);
    }

    #[test]
    fn rejects_unknown_component_type() {
        let err = parse(&format!("{BASE}\n[component.a]\ntype = \"nope\"\n")).unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(ref m) if m.contains("unknown type 'nope'")));
    }

    #[test]
    fn rejects_duplicate_trait() {
        let err = parse(&format!(
            "{BASE}\n[component.a]\ntype = \"worker\"\n[[component.a.traits]]\ntype = \"gate\"\n[[component.a.traits]]\ntype = \"gate\"\n"
        ))
        .unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(ref m) if m.contains("more than once")));
    }

    #[test]
    fn rejects_patch_on_post_dispatch() {
        let err = parse(
            r#"
[application]
name = "demo"

[component_definition.worker]
output = { kind = "Deployment", metadata = { name = "x" } }

[trait_definition.bad]
stage = "PostDispatch"
patch = { spec = { replicas = 2 } }

[component.a]
type = "worker"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(ref m) if m.contains("cannot declare a `patch`")));
    }

    #[test]
    fn rejects_backoff_below_interval() {
        let err = parse(&format!(
            "[config]\nreconcile_interval = \"10s\"\nmax_backoff = \"1s\"\n{BASE}\n[component.a]\ntype = \"worker\"\n"
        ))
        .unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(ref m) if m.contains("max_backoff")));
    }

    #[test]
    fn rejects_intervals_beyond_a_day() {
        for config in [
            "max_backoff = \"18446744073709551615s\"",
            "reconcile_interval = \"25h\"\nmax_backoff = \"25h\"",
            "reconcile_interval = \"25h\"",
        ] {
            let err = parse(&format!(
                "[config]\n{config}\n{BASE}\n[component.a]\ntype = \"worker\"\n"
            ))
            .unwrap_err();
            assert!(
                matches!(err, DispatchError::ConfigError(ref m) if m.contains("max_backoff")),
                "{config}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_missing_components() {
        let err = parse(BASE).unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError(ref m) if m.contains("at least one")));
    }
}
