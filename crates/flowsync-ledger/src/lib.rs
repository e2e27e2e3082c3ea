//! Deferred production/consumption accounting for the Flowsync engine.
//!
//! Producers and consumers never touch storage directly. They record an
//! intent against a [`ResourceLedger`] ("produce 3", "consume 1.2"), tagged
//! with a [`Broker`] for attribution. Once per tick the owning
//! [`VesselResources`] registry reconciles every intent against the real
//! containers and republishes amount, capacity, level, rates, and the
//! per-broker breakdown.
//!
//! # Architecture
//!
//! - [`container`] -- The [`ContainerRef`] abstraction over external storage
//!   and the [`ResourceHost`] capability a vessel implements.
//! - [`tank_pool`] -- [`TankPool`]: priority tiers with proportional
//!   distribution inside a tier, reused across ticks as an arena.
//! - [`broker`] -- [`Broker`] identities and the [`BrokerRegistry`] interner.
//! - [`ledger`] -- [`ResourceLedger`]: deferred intents, sync, rates, and the
//!   coherency guard.
//! - [`recipe`] -- [`Recipe`] conversions and the fixed-point batch solver.
//! - [`vessel`] -- [`VesselResources`]: all ledgers of one vessel and the
//!   per-tick sync sequence.
//! - [`cache`] -- [`ResourceCache`]: vessel id to registry.
//! - [`conservation`] -- Post-sync conservation check.
//!
//! # Tick sequence
//!
//! ```text
//! produce / consume / add_recipe   (any number of times, any caller)
//!         |
//! VesselResources::sync(host, ctx)
//!   1. execute queued recipes to a fixed point -> more deferred intents
//!   2. re-enumerate containers into fresh tank pools
//!   3. ResourceLedger::sync for every known resource
//! ```
//!
//! # Usage
//!
//! ```
//! use flowsync_ledger::{BrokerRegistry, ContainerRef, ContainerSlot, ResourceHost, SyncContext, VesselResources};
//! use flowsync_types::{BrokerCategory, Fidelity};
//!
//! struct Battery { amount: f64, max: f64 }
//!
//! impl ContainerRef for Battery {
//!     fn amount(&self) -> f64 { self.amount }
//!     fn set_amount(&mut self, amount: f64) { self.amount = amount; }
//!     fn max_amount(&self) -> f64 { self.max }
//!     fn set_max_amount(&mut self, max_amount: f64) { self.max = max_amount; }
//! }
//!
//! struct Probe { battery: Battery }
//!
//! impl ResourceHost for Probe {
//!     fn fidelity(&self) -> Fidelity { Fidelity::Full }
//!     fn containers(&mut self) -> Vec<ContainerSlot<'_>> {
//!         vec![ContainerSlot::new("ElectricCharge", 0, &mut self.battery)]
//!     }
//! }
//!
//! let mut brokers = BrokerRegistry::new();
//! let panel = brokers.get_or_create("panel", BrokerCategory::SolarPanel, "Solar panel");
//! let mut probe = Probe { battery: Battery { amount: 10.0, max: 100.0 } };
//! let mut resources = VesselResources::new();
//!
//! resources.produce("ElectricCharge", 5.0, &panel);
//! let ctx = SyncContext::new(1.0, brokers.unsupported());
//! resources.sync(&mut probe, &ctx);
//!
//! assert!((probe.battery.amount - 15.0).abs() < 1e-9);
//! ```

pub mod broker;
pub mod cache;
pub mod conservation;
pub mod container;
pub mod ledger;
pub mod recipe;
pub mod tank_pool;
pub mod vessel;

// Re-export primary types at crate root.
pub use broker::{Broker, BrokerRegistry};
pub use cache::ResourceCache;
pub use conservation::{ConservationResult, verify_sync};
pub use container::{ContainerRef, ContainerSlot, CrewAccumulators, ResourceHost};
pub use ledger::{CoherencyNotice, CoherencyPolicy, Ledgers, ResourceLedger, SyncContext, SyncRecord};
pub use recipe::{Recipe, execute_recipes};
pub use tank_pool::{DEFAULT_PRIORITY, TankPool};
pub use vessel::{VesselResources, VesselSyncReport};

/// Amounts and quantities below this magnitude are treated as zero.
pub const EPSILON: f64 = 1e-10;

/// Amount changes below this magnitude between two syncs are considered
/// floating-point noise rather than an external modification.
pub const PRECISION_GUARD: f64 = 1e-5;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building a [`Recipe`].
///
/// The sync path itself never fails: out-of-range intents are clamped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    /// Recipe entry quantities must be strictly positive and finite.
    #[error("recipe quantity for {resource} must be positive, got {quantity}")]
    NonPositiveQuantity {
        /// The resource or rule the entry names.
        resource: String,
        /// The rejected quantity.
        quantity: f64,
    },

    /// A combined input cannot substitute a resource with itself.
    #[error("combined input {resource} names itself as its secondary")]
    SelfPaired {
        /// The resource named on both sides.
        resource: String,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation detected after a ledger sync.
///
/// The amount change observed in the containers did not match the sum of
/// broker contributions, interval amounts, and external changes.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerAnomaly {
    /// The resource whose sync did not balance.
    pub resource: String,
    /// Change implied by the recorded contributions.
    pub expected_delta: f64,
    /// Change actually observed in the containers.
    pub actual_delta: f64,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Clamp without the panic `f64::clamp` raises when `min > max`.
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Whether a caller-supplied quantity is usable as an intent.
pub(crate) fn is_valid_quantity(quantity: f64) -> bool {
    quantity.is_finite() && quantity > 0.0
}
