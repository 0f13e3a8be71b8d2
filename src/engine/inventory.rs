// src/engine/inventory.rs

//! Which resource keys each owner last applied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::config::ConfigFile;
use crate::render::ResourceKey;
use crate::types::{ComponentName, TraitId};

/// Something that renders resources: a component or one of its traits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Component(ComponentName),
    Trait(TraitId),
}

impl Owner {
    pub fn component(&self) -> &str {
        match self {
            Owner::Component(name) => name,
            Owner::Trait(id) => &id.component,
        }
    }

    /// Whether this owner still exists in `cfg`.
    pub fn is_declared_in(&self, cfg: &ConfigFile) -> bool {
        match self {
            Owner::Component(name) => cfg.component.contains_key(name),
            Owner::Trait(id) => cfg
                .component
                .get(&id.component)
                .is_some_and(|c| c.traits.iter().any(|t| t.trait_type == id.trait_type)),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Component(name) => write!(f, "component {name}"),
            Owner::Trait(id) => write!(f, "trait {id}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    owned: BTreeMap<Owner, BTreeSet<ResourceKey>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what `owner` rendered this tick and return the keys it no
    /// longer renders.
    pub fn record(&mut self, owner: Owner, keys: BTreeSet<ResourceKey>) -> Vec<ResourceKey> {
        let stale: Vec<ResourceKey> = match self.owned.get(&owner) {
            Some(previous) => previous.difference(&keys).cloned().collect(),
            None => Vec::new(),
        };
        if !stale.is_empty() {
            debug!(%owner, stale = stale.len(), "owner stopped rendering resources");
        }
        self.owned.insert(owner, keys);
        stale
    }

    /// Forget owners for which `keep` is false and return all their keys.
    pub fn remove_where(&mut self, mut keep: impl FnMut(&Owner) -> bool) -> Vec<ResourceKey> {
        let mut removed = Vec::new();
        self.owned.retain(|owner, keys| {
            if keep(owner) {
                return true;
            }
            debug!(%owner, keys = keys.len(), "owner removed; collecting its resources");
            removed.extend(keys.iter().cloned());
            false
        });
        removed
    }

    pub fn keys_of(&self, owner: &Owner) -> Option<&BTreeSet<ResourceKey>> {
        self.owned.get(owner)
    }

    /// Whether any component has been applied.
    pub fn has_components(&self) -> bool {
        self.owned.keys().any(|o| matches!(o, Owner::Component(_)))
    }

    pub fn owners(&self) -> impl Iterator<Item = &Owner> {
        self.owned.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }
}
