//! Boundary traits between the engine and the entities that own storage.
//!
//! The engine never owns a container. Each tick the vessel hands out
//! short-lived mutable views ([`ContainerSlot`]) through [`ResourceHost`],
//! the engine distributes the reconciled amounts into them, and the views
//! are dropped before the sync returns. Nothing is carried over to the next
//! tick, so there is no ownership to track between ticks.

use flowsync_types::Fidelity;

/// A place that holds an amount of one resource, up to a maximum.
///
/// Live objects and serialized snapshots both implement this; the engine
/// does not care which one it is talking to.
pub trait ContainerRef {
    /// Current amount.
    fn amount(&self) -> f64;

    /// Overwrite the current amount.
    fn set_amount(&mut self, amount: f64);

    /// Maximum amount.
    fn max_amount(&self) -> f64;

    /// Overwrite the maximum amount.
    fn set_max_amount(&mut self, max_amount: f64);
}

/// One container handed to the engine for the duration of a sync.
pub struct ContainerSlot<'a> {
    /// Name of the resource held.
    pub resource: &'a str,
    /// Flow priority of the owning entity. Higher priorities are drained
    /// first and filled last.
    pub priority: i32,
    /// The container itself.
    pub container: &'a mut dyn ContainerRef,
}

impl<'a> ContainerSlot<'a> {
    /// Bundle a container with its resource name and priority.
    pub fn new(resource: &'a str, priority: i32, container: &'a mut dyn ContainerRef) -> Self {
        Self {
            resource,
            priority,
            container,
        }
    }
}

impl core::fmt::Debug for ContainerSlot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContainerSlot")
            .field("resource", &self.resource)
            .field("priority", &self.priority)
            .field("amount", &self.container.amount())
            .field("max_amount", &self.container.max_amount())
            .finish()
    }
}

/// Per-crew-member named accumulators that recipe cures decrement.
///
/// Owned by the crew/health subsystem.
pub trait CrewAccumulators {
    /// Mutable access to the accumulator named `rule` on every crew member
    /// eligible for it. An empty vector means nobody can be cured.
    fn accumulators(&mut self, rule: &str) -> Vec<&mut f64>;
}

/// The capability a vessel exposes to the engine.
pub trait ResourceHost {
    /// How the vessel is being simulated this tick.
    fn fidelity(&self) -> Fidelity;

    /// Enumerate every container on the vessel, for every resource.
    fn containers(&mut self) -> Vec<ContainerSlot<'_>>;

    /// The crew accumulators cures apply to, if the vessel has a crew.
    fn crew(&mut self) -> Option<&mut dyn CrewAccumulators> {
        None
    }
}
