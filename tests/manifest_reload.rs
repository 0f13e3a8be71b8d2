// tests/manifest_reload.rs

mod common;
use crate::common::builders::{express_server_app, ComponentBuilder};
use crate::common::{
    deployment_key, drive_tick, init_tracing, replica_status, runtime_with, status_cm_key,
    with_timeout, RecordingCluster,
};

use std::error::Error;
use std::sync::Arc;

use serde_json::json;
use vela_dispatch::cluster::InMemoryCluster;
use vela_dispatch::config::load_with_fs;
use vela_dispatch::dispatch::DispatchPhase;
use vela_dispatch::engine::{CoreRuntime, RuntimeEvent, RuntimeOptions};
use vela_dispatch::fs::{FileSystem, RealFileSystem};
use vela_dispatch::types::TraitId;
use vela_dispatch::watch::{Fingerprint, ManifestReloader};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn new_generation_re_pends_dispatched_traits() {
    init_tracing();
    let cluster = InMemoryCluster::new();
    let mut core = CoreRuntime::new(express_server_app(1).build(), RuntimeOptions::default());
    let id = TraitId::new("express-server", "status-reporter");

    drive_tick(&mut core, &cluster);
    cluster.set_status(&deployment_key("express-server"), replica_status(1, 1));
    drive_tick(&mut core, &cluster);
    assert_eq!(core.tracker().phase(&id), Some(DispatchPhase::Dispatched));

    // Scale up; the workload controller starts rolling out.
    core.step(RuntimeEvent::ManifestChanged(Box::new(express_server_app(3).build())));
    assert_eq!(core.generation(), 2);
    cluster.set_status(&deployment_key("express-server"), replica_status(0, 3));
    let step = drive_tick(&mut core, &cluster);

    let svc = step.status().unwrap().service("express-server").unwrap().clone();
    assert!(!svc.healthy);
    assert!(svc.traits[0].pending);
    assert_eq!(core.tracker().phase(&id), Some(DispatchPhase::Pending));

    let deployment = cluster.get(&deployment_key("express-server")).unwrap();
    assert_eq!(deployment["metadata"]["labels"]["app.oam.dev/name"], json!("express-app"));
}

#[tokio::test]
async fn removed_component_is_garbage_collected() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(1, 1));

    let two = express_server_app(1)
        .component(
            "sidecar",
            ComponentBuilder::new("webservice")
                .properties(json!({ "image": "side:v1", "replicas": 1 }))
                .build(),
        )
        .build();
    let options = RuntimeOptions {
        exit_when_settled: false,
        max_ticks: Some(20),
    };
    let (runtime, tx) = runtime_with(two, options, &cluster);
    let mut status_rx = runtime.subscribe();
    let handle = tokio::spawn(runtime.run());

    // Once the reporter ConfigMap exists, drop the sidecar and the trait.
    with_timeout(async {
        loop {
            if cluster.inner().contains(&status_cm_key("express-server")) {
                break;
            }
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await;

    let one = express_server_app(1)
        .component(
            "express-server",
            ComponentBuilder::new("webservice")
                .properties(json!({ "image": "hello:v1", "replicas": 1 }))
                .build(),
        )
        .build();
    tx.send(RuntimeEvent::ManifestChanged(Box::new(one))).await?;

    let last = with_timeout(handle).await??.expect("a status was published");
    assert_eq!(last.generation, 2);
    assert_eq!(last.services.len(), 1);
    assert!(last.services[0].traits.is_empty());

    let deleted = cluster.deleted_keys();
    assert!(deleted.contains(&deployment_key("sidecar")));
    assert!(deleted.contains(&status_cm_key("express-server")));
    assert!(cluster.inner().contains(&deployment_key("express-server")));
    Ok(())
}

#[test]
fn reloader_follows_manifest_on_disk() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vela.toml");
    let v1 = r#"
[application]
name = "demo"
[component_definition.worker]
output = { kind = "Deployment", metadata = { name = "${context.name}" } }
[component.a]
type = "worker"
"#;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    fs.write(&path, v1.as_bytes())?;
    let (_, contents) = load_with_fs(fs.as_ref(), &path)?;
    let mut reloader = ManifestReloader::new(Arc::clone(&fs), &path, Fingerprint::of(&contents));

    // Rewriting identical content is not a change.
    fs.write(&path, v1.as_bytes())?;
    assert!(reloader.reload().is_none());

    // An invalid edit is skipped.
    fs.write(&path, b"[component.a]\ntype = \"missing\"\n")?;
    assert!(reloader.reload().is_none());

    let v2 = format!("{v1}[component.b]\ntype = \"worker\"\nnamespace = \"jobs\"\n");
    fs.write(&path, v2.as_bytes())?;
    let cfg = reloader.reload().expect("valid change is picked up");
    assert_eq!(cfg.component["b"].effective_namespace(&cfg.application), "jobs");
    Ok(())
}
