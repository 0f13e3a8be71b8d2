// tests/error_handling.rs

mod common;
use crate::common::builders::{
    express_server_app, webservice, ComponentBuilder, ComponentDefinitionBuilder,
};
use crate::common::{deployment_key, drive_tick, init_tracing, replica_status};

use std::io::Write;

use serde_json::json;
use tempfile::NamedTempFile;
use vela_dispatch::cluster::InMemoryCluster;
use vela_dispatch::config::load_and_validate;
use vela_dispatch::engine::{CoreRuntime, RuntimeEvent, RuntimeOptions};
use vela_dispatch::errors::DispatchError;
use vela_dispatch::status::AppPhase;

fn manifest_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn missing_manifest_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/vela.toml");
    assert!(matches!(result, Err(DispatchError::IoError(_))));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = manifest_file("[application\nname = ");
    assert!(matches!(load_and_validate(file.path()), Err(DispatchError::TomlError(_))));
}

#[test]
fn manifest_without_components_is_rejected() {
    let file = manifest_file("[application]\nname = \"demo\"\n");
    match load_and_validate(file.path()) {
        Err(DispatchError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn bad_engine_settings_are_rejected() {
    let base = r#"
[application]
name = "demo"
[component_definition.worker]
output = { kind = "Deployment", metadata = { name = "w" } }
[component.w]
type = "worker"
"#;
    for (config, needle) in [
        ("reconcile_interval = \"0s\"", "must be > 0"),
        ("reconcile_interval = \"5s\"\nmax_backoff = \"1s\"", "max_backoff"),
        ("pending_warn_after = 0", "pending_warn_after"),
        ("reconcile_interval = \"soon\"", "reconcile_interval"),
    ] {
        let file = manifest_file(&format!("[config]\n{config}\n{base}"));
        match load_and_validate(file.path()) {
            Err(DispatchError::ConfigError(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("Expected ConfigError for {config:?}, got: {other:?}"),
        }
    }
}

#[test]
fn oversized_timing_is_rejected_without_panicking() {
    for (interval, backoff) in [
        ("1s", "5124095576030432h"),
        ("18446744073709551615s", "18446744073709551615s"),
        ("1s", "2d"),
        ("1s", "48h"),
    ] {
        let result = express_server_app(1)
            .reconcile_interval(interval)
            .max_backoff(backoff)
            .try_build();
        match result {
            Err(DispatchError::ConfigError(msg)) => assert!(msg.contains("max_backoff"), "{msg}"),
            other => panic!("Expected ConfigError for {backoff:?}, got: {other:?}"),
        }
    }

    let file = manifest_file(
        r#"
[config]
max_backoff = "5124095576030432h"
[application]
name = "demo"
[component_definition.worker]
output = { kind = "Deployment", metadata = { name = "w" } }
[component.w]
type = "worker"
"#,
    );
    match load_and_validate(file.path()) {
        Err(DispatchError::ConfigError(msg)) => assert!(msg.contains("duration too large"), "{msg}"),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn render_failure_recovers_once_parameter_is_supplied() {
    init_tracing();
    let good = express_server_app(2).build();
    let broken = express_server_app(2)
        .component(
            "express-server",
            ComponentBuilder::new("webservice")
                .properties(json!({ "image": "hello:v1" }))
                .with_trait("status-reporter", json!({}))
                .build(),
        )
        .build();

    let cluster = InMemoryCluster::new();
    let mut core = CoreRuntime::new(good.clone(), RuntimeOptions::default());
    drive_tick(&mut core, &cluster);

    core.step(RuntimeEvent::ManifestChanged(Box::new(broken)));
    let step = drive_tick(&mut core, &cluster);
    assert_eq!(step.errors.len(), 1);
    let svc = step.status().unwrap().service("express-server").unwrap().clone();
    assert!(!svc.healthy);
    assert!(svc.message.unwrap().contains("output.spec.replicas"));
    assert!(cluster.contains(&deployment_key("express-server")));

    core.step(RuntimeEvent::ManifestChanged(Box::new(good)));
    let step = drive_tick(&mut core, &cluster);
    assert!(step.errors.is_empty());
}

#[test]
fn broken_component_does_not_block_its_sibling() {
    init_tracing();
    let bad_policy = ComponentDefinitionBuilder::new(webservice().output)
        .health_policy("isHealth: context.output.status.readyReplicas + \"x\"")
        .build();
    let cfg = express_server_app(1)
        .component_definition("broken-service", bad_policy)
        .component(
            "worker",
            ComponentBuilder::new("broken-service")
                .properties(json!({ "image": "w:v1", "replicas": 1 }))
                .build(),
        )
        .build();

    let cluster = InMemoryCluster::new();
    let mut core = CoreRuntime::new(cfg, RuntimeOptions::default());
    drive_tick(&mut core, &cluster);
    cluster.set_status(&deployment_key("express-server"), replica_status(1, 1));
    cluster.set_status(&deployment_key("worker"), replica_status(1, 1));
    drive_tick(&mut core, &cluster);
    let step = drive_tick(&mut core, &cluster);

    let status = step.status().unwrap();
    assert_eq!(status.phase, AppPhase::RunningWorkflow);

    let worker = status.service("worker").unwrap();
    assert!(!worker.healthy);
    assert!(worker.message.as_deref().unwrap().starts_with("health policy:"));

    let express = status.service("express-server").unwrap();
    assert!(express.healthy);
    assert!(express.traits[0].healthy);
}
