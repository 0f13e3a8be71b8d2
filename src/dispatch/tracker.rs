// src/dispatch/tracker.rs

//! Per-generation dispatch state of PostDispatch traits.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::types::TraitId;

/// Phase of a PostDispatch trait within one manifest generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// Waiting for the component to report healthy.
    Pending,
    /// Component was healthy at least once in this generation; the trait is
    /// rendered against live state every tick from now on.
    Dispatched,
}

#[derive(Debug, Clone)]
struct TraitRecord {
    phase: DispatchPhase,
    /// Tick at which the trait (re-)entered `Pending`.
    pending_since: u64,
    warned: bool,
}

/// What [`DispatchTracker::observe`] decided for one trait this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub phase: DispatchPhase,
    /// Ticks spent pending so far (0 once dispatched).
    pub pending_ticks: u64,
    /// True exactly once per generation, when the trait has been pending for
    /// `pending_warn_after` ticks.
    pub warn: bool,
}

/// Tracks `Pending -> Dispatched` for every PostDispatch trait.
///
/// The transition is monotonic within a generation: a component that turns
/// unhealthy later does not move its traits back to `Pending`. Only
/// [`begin_generation`](Self::begin_generation) does.
#[derive(Debug, Clone)]
pub struct DispatchTracker {
    records: BTreeMap<TraitId, TraitRecord>,
    generation: u64,
    pending_warn_after: u64,
}

impl DispatchTracker {
    pub fn new(pending_warn_after: u64) -> Self {
        Self {
            records: BTreeMap::new(),
            generation: 0,
            pending_warn_after: pending_warn_after.max(1),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_pending_warn_after(&mut self, ticks: u64) {
        self.pending_warn_after = ticks.max(1);
    }

    /// Start a new manifest generation: every known trait goes back to
    /// `Pending`, counted from `tick`.
    pub fn begin_generation(&mut self, generation: u64, tick: u64) {
        self.generation = generation;
        for record in self.records.values_mut() {
            record.phase = DispatchPhase::Pending;
            record.pending_since = tick;
            record.warned = false;
        }
        debug!(
            generation,
            traits = self.records.len(),
            "new generation; PostDispatch traits re-pended"
        );
    }

    /// Level-triggered gate, evaluated every tick.
    ///
    /// A trait seen for the first time starts `Pending` at `tick`. A pending
    /// trait whose component is healthy in this tick becomes `Dispatched`.
    pub fn observe(&mut self, id: &TraitId, component_healthy: bool, tick: u64) -> Observation {
        let warn_after = self.pending_warn_after;
        let record = self.records.entry(id.clone()).or_insert_with(|| TraitRecord {
            phase: DispatchPhase::Pending,
            pending_since: tick,
            warned: false,
        });

        if record.phase == DispatchPhase::Pending && component_healthy {
            record.phase = DispatchPhase::Dispatched;
            info!(
                component = %id.component,
                trait_type = %id.trait_type,
                generation = self.generation,
                tick,
                "component healthy; dispatching PostDispatch trait"
            );
        }

        match record.phase {
            DispatchPhase::Dispatched => Observation {
                phase: DispatchPhase::Dispatched,
                pending_ticks: 0,
                warn: false,
            },
            DispatchPhase::Pending => {
                let pending_ticks = tick.saturating_sub(record.pending_since);
                let warn = !record.warned && pending_ticks >= warn_after;
                if warn {
                    record.warned = true;
                }
                Observation {
                    phase: DispatchPhase::Pending,
                    pending_ticks,
                    warn,
                }
            }
        }
    }

    pub fn phase(&self, id: &TraitId) -> Option<DispatchPhase> {
        self.records.get(id).map(|r| r.phase)
    }

    /// Drop state for traits that are no longer attached.
    pub fn retain(&mut self, mut keep: impl FnMut(&TraitId) -> bool) {
        self.records.retain(|id, _| {
            let kept = keep(id);
            if !kept {
                debug!(trait_id = %id, "forgetting detached trait");
            }
            kept
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> TraitId {
        TraitId::new("express-server", "status-reporter")
    }

    #[test]
    fn dispatches_once_component_is_healthy() {
        let mut t = DispatchTracker::new(30);
        assert_eq!(t.observe(&id(), false, 1).phase, DispatchPhase::Pending);
        assert_eq!(t.observe(&id(), true, 2).phase, DispatchPhase::Dispatched);
    }

    #[test]
    fn never_undispatches_within_generation() {
        let mut t = DispatchTracker::new(30);
        t.observe(&id(), true, 1);
        assert_eq!(t.observe(&id(), false, 2).phase, DispatchPhase::Dispatched);
        assert_eq!(t.phase(&id()), Some(DispatchPhase::Dispatched));
    }

    #[test]
    fn new_generation_repends() {
        let mut t = DispatchTracker::new(30);
        t.observe(&id(), true, 1);
        t.begin_generation(2, 5);
        assert_eq!(t.generation(), 2);
        assert_eq!(t.phase(&id()), Some(DispatchPhase::Pending));
        let obs = t.observe(&id(), false, 7);
        assert_eq!(obs.pending_ticks, 2);
    }

    #[test]
    fn warns_exactly_once() {
        let mut t = DispatchTracker::new(2);
        assert!(!t.observe(&id(), false, 0).warn);
        assert!(!t.observe(&id(), false, 1).warn);
        assert!(t.observe(&id(), false, 2).warn);
        assert!(!t.observe(&id(), false, 3).warn);
    }

    #[test]
    fn retain_forgets_detached() {
        let mut t = DispatchTracker::new(30);
        t.observe(&id(), false, 0);
        t.observe(&TraitId::new("other", "gate"), false, 0);
        t.retain(|i| i.component == "other");
        assert_eq!(t.len(), 1);
        assert_eq!(t.phase(&id()), None);
    }
}
