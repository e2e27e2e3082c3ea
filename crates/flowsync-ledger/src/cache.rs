//! Process-wide map from vessel id to its resource registry.

use std::collections::BTreeMap;

use flowsync_types::VesselId;

use crate::VesselResources;

/// Registries of every vessel, created on first access.
#[derive(Debug, Default)]
pub struct ResourceCache {
    vessels: BTreeMap<VesselId, VesselResources>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub const fn new() -> Self {
        Self {
            vessels: BTreeMap::new(),
        }
    }

    /// Registry for `vessel`, created on first access.
    pub fn get_or_create(&mut self, vessel: VesselId) -> &mut VesselResources {
        self.vessels.entry(vessel).or_default()
    }

    /// Existing registry for `vessel`.
    pub fn get(&self, vessel: VesselId) -> Option<&VesselResources> {
        self.vessels.get(&vessel)
    }

    /// Existing registry for `vessel`, mutably.
    pub fn get_mut(&mut self, vessel: VesselId) -> Option<&mut VesselResources> {
        self.vessels.get_mut(&vessel)
    }

    /// Drop the registry of a destroyed vessel. Returns whether it existed.
    pub fn purge(&mut self, vessel: VesselId) -> bool {
        self.vessels.remove(&vessel).is_some()
    }

    /// Drop every registry (session reset).
    pub fn clear(&mut self) {
        self.vessels.clear();
    }

    /// Number of cached vessels.
    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    /// Whether no vessel is cached.
    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    /// Iterate registries in vessel id order.
    pub fn iter(&self) -> impl Iterator<Item = (&VesselId, &VesselResources)> {
        self.vessels.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::BrokerRegistry;

    #[test]
    fn get_or_create_is_lazy_and_stable() {
        let registry = BrokerRegistry::new();
        let mut cache = ResourceCache::new();
        let vessel = VesselId::new();
        assert!(cache.get(vessel).is_none());

        cache
            .get_or_create(vessel)
            .produce("Oxygen", 1.0, registry.generic());
        let deferred = cache
            .get(vessel)
            .and_then(|r| r.get("Oxygen"))
            .map(crate::ResourceLedger::deferred);

        assert_eq!(cache.len(), 1);
        assert!(deferred.is_some_and(|d| (d - 1.0).abs() < 1e-12));
    }

    #[test]
    fn purge_and_clear() {
        let mut cache = ResourceCache::new();
        let a = VesselId::new();
        let b = VesselId::new();
        cache.get_or_create(a);
        cache.get_or_create(b);

        assert!(cache.purge(a));
        assert!(!cache.purge(a));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
