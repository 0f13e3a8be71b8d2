#![allow(dead_code)]

pub use vela_dispatch_test_utils::builders;
pub use vela_dispatch_test_utils::{init_tracing, with_timeout, ClusterOp, RecordingCluster};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use vela_dispatch::config::ConfigFile;
use vela_dispatch::cluster::InMemoryCluster;
use vela_dispatch::engine::{CoreRuntime, CoreStep, Runtime, RuntimeEvent, RuntimeOptions};
use vela_dispatch::render::ResourceKey;

pub fn deployment_key(name: &str) -> ResourceKey {
    ResourceKey::new("local", "default", "Deployment", name)
}

pub fn status_cm_key(component: &str) -> ResourceKey {
    ResourceKey::new("local", "default", "ConfigMap", &format!("{component}-status"))
}

/// Workload status as a controller would report it.
pub fn replica_status(ready: i64, total: i64) -> Value {
    json!({ "replicas": total, "readyReplicas": ready })
}

/// Runtime over a cloned `cluster` handle, plus the sender side of its
/// event channel.
pub fn runtime_with(
    cfg: ConfigFile,
    options: RuntimeOptions,
    cluster: &RecordingCluster,
) -> (Runtime<RecordingCluster>, mpsc::Sender<RuntimeEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let core = CoreRuntime::new(cfg, options);
    (Runtime::new(core, rx, cluster.clone()), tx)
}

/// One synchronous reconcile pass: snapshot `cluster`, step the core, and
/// carry out the step's applies and deletes.
pub fn drive_tick(core: &mut CoreRuntime, cluster: &InMemoryCluster) -> CoreStep {
    let step = core.step(RuntimeEvent::Tick {
        live: cluster.snapshot_now(),
    });
    cluster.apply_now(step.applied().cloned());
    cluster.delete_now(step.deleted().cloned());
    step
}
