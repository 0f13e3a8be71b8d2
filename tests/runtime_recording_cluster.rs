// tests/runtime_recording_cluster.rs

mod common;
use crate::common::builders::express_server_app;
use crate::common::{
    deployment_key, init_tracing, replica_status, runtime_with, status_cm_key, with_timeout,
    ClusterOp, RecordingCluster,
};

use std::error::Error;
use std::sync::Arc;

use serde_json::Value;
use vela_dispatch::engine::{RuntimeEvent, RuntimeOptions, StatusFile};
use vela_dispatch::fs::MockFileSystem;
use vela_dispatch::status::AppPhase;

type TestResult = Result<(), Box<dyn Error>>;

fn once() -> RuntimeOptions {
    RuntimeOptions {
        exit_when_settled: true,
        max_ticks: Some(50),
    }
}

#[tokio::test]
async fn once_exits_after_post_dispatch_trait_settles() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(1, 1));

    let (runtime, _tx) = runtime_with(express_server_app(1).build(), once(), &cluster);
    let status = with_timeout(runtime.run()).await?.expect("a status was published");

    assert_eq!(status.phase, AppPhase::Running);
    assert_eq!(status.tick, 3);

    let applied = cluster.applied_keys();
    let first_deploy = applied.iter().position(|k| *k == deployment_key("express-server"));
    let first_cm = applied.iter().position(|k| *k == status_cm_key("express-server"));
    assert_eq!(first_deploy, Some(0));
    assert!(first_cm.unwrap() > first_deploy.unwrap());
    assert!(cluster.deleted_keys().is_empty());
    Ok(())
}

#[tokio::test]
async fn trait_is_never_applied_while_component_is_unhealthy() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(0, 3));

    let options = RuntimeOptions {
        exit_when_settled: true,
        max_ticks: Some(5),
    };
    let (runtime, _tx) = runtime_with(express_server_app(3).build(), options, &cluster);
    let status = with_timeout(runtime.run()).await?.expect("a status was published");

    assert_eq!(status.tick, 5);
    assert_eq!(status.phase, AppPhase::RunningWorkflow);
    assert!(status.services[0].traits[0].pending);
    assert!(
        cluster
            .applied_keys()
            .iter()
            .all(|k| *k != status_cm_key("express-server"))
    );
    Ok(())
}

#[tokio::test]
async fn shutdown_event_stops_the_loop() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    let (runtime, tx) = runtime_with(express_server_app(1).build(), RuntimeOptions::default(), &cluster);
    let mut status_rx = runtime.subscribe();

    let handle = tokio::spawn(runtime.run());

    // Wait for the first published status, then ask the loop to stop.
    with_timeout(status_rx.changed()).await?;
    tx.send(RuntimeEvent::ShutdownRequested).await?;

    let last = with_timeout(handle).await??;
    assert!(last.is_some());
    Ok(())
}

#[tokio::test]
async fn status_file_receives_camel_case_json() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(1, 1));

    let fs = MockFileSystem::new();
    let (runtime, _tx) = runtime_with(express_server_app(1).build(), once(), &cluster);
    let runtime = runtime.with_status_file(StatusFile {
        fs: Arc::new(fs.clone()),
        path: "out/status.json".into(),
    });
    with_timeout(runtime.run()).await?;

    let written = fs.contents("out/status.json").expect("status file written");
    let json: Value = serde_json::from_str(&written)?;
    assert_eq!(json["phase"], "running");
    assert_eq!(json["services"][0]["name"], "express-server");
    assert_eq!(json["services"][0]["traits"][0]["type"], "status-reporter");
    assert_eq!(json["services"][0]["traits"][0]["stage"], "PostDispatch");
    Ok(())
}

#[tokio::test]
async fn failed_apply_is_retried_on_a_later_tick() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(1, 1));
    cluster.fail_next_applies(2);

    let (runtime, _tx) = runtime_with(express_server_app(1).build(), once(), &cluster);
    let status = with_timeout(runtime.run()).await?.expect("a status was published");

    assert_eq!(status.phase, AppPhase::Running);
    assert!(status.tick > 3);
    let applies = cluster
        .ops()
        .into_iter()
        .filter(|op| matches!(op, ClusterOp::Apply(_)))
        .count();
    assert!(applies >= 3);
    Ok(())
}

#[tokio::test]
async fn unreadable_live_state_skips_ticks_without_stopping() -> TestResult {
    init_tracing();
    let cluster = RecordingCluster::new();
    cluster.set_status_on_apply(deployment_key("express-server"), replica_status(1, 1));
    cluster.fail_next_snapshots(2);

    let (runtime, _tx) = runtime_with(express_server_app(1).build(), once(), &cluster);
    let status = with_timeout(runtime.run()).await?.expect("a status was published");

    // Skipped reads do not count as ticks.
    assert_eq!(status.tick, 3);
    assert_eq!(status.phase, AppPhase::Running);
    Ok(())
}
