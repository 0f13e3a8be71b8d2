// src/lib.rs

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod expr;
pub mod fs;
pub mod health;
pub mod logging;
pub mod render;
pub mod status;
pub mod types;
pub mod watch;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::cluster::SimulatedCluster;
use crate::config::{load_with_fs, ConfigFile};
use crate::dispatch::StagePlan;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, StatusFile};
use crate::fs::{FileSystem, RealFileSystem};
use crate::render::{apply_trait_patch, render_component, render_trait_outputs, RenderMeta};
use crate::watch::{spawn_manifest_watcher, Fingerprint};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - the simulated cluster (with the optional `--live` overlay)
/// - core / runtime
/// - (optional) manifest watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let (cfg, contents) = load_with_fs(fs.as_ref(), &args.app)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let _watcher_handle = if args.watch {
        Some(spawn_manifest_watcher(
            args.app.clone(),
            Arc::clone(&fs),
            Fingerprint::of(&contents),
            rt_tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        exit_when_settled: args.once,
        max_ticks: args.max_ticks,
    };

    let cluster = SimulatedCluster::new(Arc::clone(&fs), args.live.clone());
    let core = CoreRuntime::new(cfg, options);
    let mut runtime = Runtime::new(core, rt_rx, cluster);
    if let Some(path) = args.status_file.clone() {
        runtime = runtime.with_status_file(StatusFile { fs, path });
    }

    match runtime.run().await? {
        Some(status) => println!("{status}"),
        None => info!("no status was published"),
    }
    Ok(())
}

fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_dry_run(cfg, &mut out)?;
    out.flush()?;
    debug!("dry-run complete (nothing applied)");
    Ok(())
}

/// Render every component and its default-stage traits against an empty
/// live state. PostDispatch traits are listed, not rendered: their inputs
/// only exist once the component is running.
pub fn write_dry_run(cfg: &ConfigFile, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "vela-dispatch dry-run")?;
    writeln!(
        out,
        "  application = {} (namespace {})",
        cfg.application.name, cfg.application.namespace
    )?;
    writeln!(
        out,
        "  reconcile_interval = {:?}, max_backoff = {:?}",
        cfg.settings.reconcile_interval, cfg.settings.max_backoff
    )?;

    for (name, component) in &cfg.component {
        writeln!(out)?;
        writeln!(out, "component {name} ({})", component.component_type)?;

        let Some(def) = cfg.definition_of(component) else {
            writeln!(out, "  error: unknown component type")?;
            continue;
        };
        let meta = RenderMeta::for_component(cfg, name, component, 1);
        let mut rc = match render_component(def, &meta, &component.properties) {
            Ok(rc) => rc,
            Err(e) => {
                writeln!(out, "  error: {e}")?;
                continue;
            }
        };

        let plan = StagePlan::for_component(cfg, component);
        let mut trait_resources = Vec::new();
        for planned in &plan.default {
            let props = &planned.config.properties;
            let rendered = apply_trait_patch(&mut rc, planned.definition, &meta, props).and_then(|()| {
                render_trait_outputs(
                    planned.definition,
                    planned.trait_type(),
                    &meta,
                    props,
                    Some(&rc.primary.object),
                    &rc.output_objects(),
                )
            });
            trait_resources.push((planned.trait_type(), rendered));
        }

        for resource in rc.resources() {
            write_resource(out, &resource.key.to_string(), &resource.object)?;
        }
        for (trait_type, rendered) in trait_resources {
            writeln!(out, "  trait {trait_type} (default)")?;
            match rendered {
                Ok(outputs) => {
                    for resource in outputs.values() {
                        write_resource(out, &resource.key.to_string(), &resource.object)?;
                    }
                }
                Err(e) => writeln!(out, "    error: {e}")?,
            }
        }
        for planned in &plan.post_dispatch {
            let names: Vec<&String> = planned.definition.outputs.keys().collect();
            writeln!(
                out,
                "  trait {} (PostDispatch): deferred until {name} is healthy; outputs {names:?}",
                planned.trait_type()
            )?;
        }
    }
    Ok(())
}

fn write_resource(out: &mut impl Write, key: &str, object: &serde_json::Value) -> std::io::Result<()> {
    writeln!(out, "  - {key}")?;
    let pretty = serde_json::to_string_pretty(object).map_err(std::io::Error::other)?;
    for line in pretty.lines() {
        writeln!(out, "      {line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    const MANIFEST: &str = r#"
[application]
name = "demo"

[component_definition.webservice]
[component_definition.webservice.output]
kind = "Deployment"
metadata = { name = "${context.name}" }
spec = { replicas = "${parameter.replicas}" }

[trait_definition.scaler]
patch = { spec = { replicas = "${parameter.count}" } }

[trait_definition.reporter]
stage = "PostDispatch"
[trait_definition.reporter.outputs.cm]
kind = "ConfigMap"
metadata = { name = "${context.name}-status" }

[component.web]
type = "webservice"
properties = { replicas = 1 }
[[component.web.traits]]
type = "scaler"
properties = { count = 4 }
[[component.web.traits]]
type = "reporter"
"#;

    #[test]
    fn dry_run_renders_defaults_and_defers_post_dispatch() {
        let cfg = load_from_str(MANIFEST).unwrap();
        let mut buf = Vec::new();
        write_dry_run(&cfg, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("local/default/Deployment/web"));
        assert!(text.contains("\"replicas\": 4"));
        assert!(text.contains("trait reporter (PostDispatch): deferred"));
        assert!(!text.contains("ConfigMap/web-status"));
    }
}
