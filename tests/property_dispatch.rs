// tests/property_dispatch.rs

mod common;
use crate::common::builders::express_server_app;
use crate::common::{deployment_key, drive_tick, replica_status, status_cm_key};

use proptest::prelude::*;
use vela_dispatch::cluster::InMemoryCluster;
use vela_dispatch::engine::{CoreRuntime, RuntimeEvent, RuntimeOptions};

proptest! {
    /// PostDispatch traits are applied only on ticks where the component was
    /// judged healthy (or after), and never fall back to pending within a
    /// generation.
    #[test]
    fn dispatch_is_gated_and_monotonic(
        replicas in 1i64..5,
        ready in proptest::collection::vec(0i64..5, 1..12),
    ) {
        let cluster = InMemoryCluster::new();
        let mut core = CoreRuntime::new(express_server_app(replicas).build(), RuntimeOptions::default());
        drive_tick(&mut core, &cluster);

        let mut dispatched = false;
        for ready_now in ready {
            let ready_now = ready_now.min(replicas);
            cluster.set_status(&deployment_key("express-server"), replica_status(ready_now, replicas));
            let step = drive_tick(&mut core, &cluster);

            let svc = step.status().unwrap().service("express-server").unwrap().clone();
            let pending = svc.traits[0].pending;
            let applied_cm = step.applied().any(|r| r.key == status_cm_key("express-server"));

            prop_assert_eq!(svc.healthy, ready_now == replicas);
            if dispatched {
                prop_assert!(!pending);
                prop_assert!(applied_cm);
            } else if svc.healthy {
                prop_assert!(!pending);
                prop_assert!(applied_cm);
                dispatched = true;
            } else {
                prop_assert!(pending);
                prop_assert!(!applied_cm);
            }
        }
    }

    /// With live state held still, successive ticks report the same status.
    #[test]
    fn reconcile_is_idempotent_over_a_fixed_snapshot(
        replicas in 1i64..5,
        ready in 0i64..5,
        settle_ticks in 1usize..4,
    ) {
        let cluster = InMemoryCluster::new();
        let mut core = CoreRuntime::new(express_server_app(replicas).build(), RuntimeOptions::default());
        drive_tick(&mut core, &cluster);
        cluster.set_status(&deployment_key("express-server"), replica_status(ready.min(replicas), replicas));
        for _ in 0..settle_ticks {
            drive_tick(&mut core, &cluster);
        }
        drive_tick(&mut core, &cluster);

        let live = cluster.snapshot_now();
        let a = core.step(RuntimeEvent::Tick { live: live.clone() });
        let b = core.step(RuntimeEvent::Tick { live });

        let (a_status, b_status) = (a.status().unwrap(), b.status().unwrap());
        prop_assert_eq!(&a_status.services, &b_status.services);
        prop_assert_eq!(a_status.phase, b_status.phase);
        let a_applied: Vec<_> = a.applied().cloned().collect();
        let b_applied: Vec<_> = b.applied().cloned().collect();
        prop_assert_eq!(a_applied, b_applied);
        prop_assert_eq!(b.deleted().count(), 0);
    }
}
