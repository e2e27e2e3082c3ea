//! The [`ResourceUpdater`] capability: per-vessel producers and consumers.
//!
//! Anything that changes resources during a tick (a solar panel, a life
//! support loop, a scrubber) is an updater attached to a vessel. The driver
//! calls every updater of a vessel before that vessel's ledgers sync, so
//! the intents an updater records are applied in the same tick.

use flowsync_ledger::VesselResources;
use flowsync_world::Vessel;

/// Errors an updater can report. A failing updater is skipped for the tick;
/// the simulation continues.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// A recipe could not be built.
    #[error("recipe rejected: {source}")]
    Recipe {
        /// The underlying ledger error.
        #[from]
        source: flowsync_ledger::FlowError,
    },

    /// The vessel lacks a part or resource the updater needs.
    #[error("vessel is missing {what}")]
    Missing {
        /// What was missing.
        what: String,
    },
}

/// Timing information handed to updaters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    /// Tick being executed.
    pub tick: u64,
    /// Simulated seconds covered by this tick.
    pub elapsed: f64,
    /// Simulated seconds since tick 0, including this tick.
    pub sim_time: f64,
}

/// A producer or consumer attached to one vessel.
pub trait ResourceUpdater {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Record this tick's intents against `resources`.
    ///
    /// Updaters normally only call `produce`, `consume`, `add_recipe` or a
    /// ledger's `update_interval_rule`. Writing to `vessel` containers
    /// directly bypasses the ledger and is reported as an unsupported
    /// change at sync.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] if the updater cannot run this tick.
    fn update(
        &mut self,
        vessel: &mut Vessel,
        resources: &mut VesselResources,
        ctx: &UpdateContext,
    ) -> Result<(), UpdateError>;
}
