//! Per-resource ledger: deferred intents reconciled once per tick.
//!
//! A [`ResourceLedger`] accumulates every `produce`/`consume` call of the
//! tick into a single signed `deferred` quantity, remembering which broker
//! asked for what. [`ResourceLedger::sync`] then:
//!
//! 1. reads the fresh amount and capacity from the rebuilt [`TankPool`];
//! 2. attributes any change it did not cause to the `unsupported` broker;
//! 3. clamps `deferred` into what the containers can give or take;
//! 4. distributes it through the pool;
//! 5. recomputes level, rate, and average rate;
//! 6. publishes the broker breakdown and clears the tick state;
//! 7. raises a [`CoherencyNotice`] when an external writer is adding the
//!    resource at a time acceleration the engine cannot keep coherent.
//!
//! Nothing in here returns an error. Bad input is absorbed: non-positive
//! intents are ignored, oversize intents are clamped.

use std::collections::BTreeMap;

use flowsync_types::{BrokerShare, Fidelity, LedgerView, ResourceId};
use serde::Serialize;
use tracing::debug;

use crate::{Broker, ContainerRef, EPSILON, PRECISION_GUARD, TankPool};

// ---------------------------------------------------------------------------
// Sync context
// ---------------------------------------------------------------------------

/// When and how hard the coherency guard throttles the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoherencyPolicy {
    /// Whether the guard is active at all.
    pub enforced: bool,
    /// Time acceleration above which external writers are not tolerated.
    pub acceleration_threshold: f64,
    /// Acceleration the driver is capped to when the guard fires.
    pub throttled_acceleration: f64,
}

impl Default for CoherencyPolicy {
    fn default() -> Self {
        Self {
            enforced: true,
            acceleration_threshold: 1000.0,
            throttled_acceleration: 100.0,
        }
    }
}

/// Tick-wide parameters for a sync pass.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    /// Simulated seconds covered by this tick.
    pub elapsed: f64,
    /// Current time acceleration of the driver.
    pub acceleration: f64,
    /// Whether this tick falls in the transient window after an
    /// acceleration change. Rates are held over while blending.
    pub blending: bool,
    /// Group containers by their priority, or put all of them in
    /// [`DEFAULT_PRIORITY`](crate::DEFAULT_PRIORITY).
    pub priority_flow: bool,
    /// Coherency guard settings.
    pub coherency: CoherencyPolicy,
    /// Broker external changes are attributed to.
    pub unsupported: &'a Broker,
}

impl<'a> SyncContext<'a> {
    /// Context for a real-time tick of `elapsed` seconds with default
    /// settings.
    pub fn new(elapsed: f64, unsupported: &'a Broker) -> Self {
        Self {
            elapsed,
            acceleration: 1.0,
            blending: false,
            priority_flow: true,
            coherency: CoherencyPolicy::default(),
            unsupported,
        }
    }
}

/// Throttling signal raised by the coherency guard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoherencyNotice {
    /// Resource being modified outside the engine.
    pub resource: String,
    /// Rate of the external addition, units per second.
    pub unsupported_rate: f64,
    /// Maximum acceleration the driver must fall back to.
    pub max_acceleration: f64,
}

impl core::fmt::Display for CoherencyNotice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} is being added outside the resource engine ({:.6}/s); time acceleration capped at {}x",
            self.resource, self.unsupported_rate, self.max_acceleration
        )
    }
}

/// What happened during the last sync of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncRecord {
    /// Amount after the previous sync.
    pub old_amount: f64,
    /// Amount after this sync.
    pub new_amount: f64,
    /// Sum of the direct broker contributions recorded this tick.
    pub contributions: f64,
    /// Sum of the one-off interval rule amounts applied this tick.
    pub interval_amount: f64,
    /// Raw change found in the containers before the deferred amount was
    /// applied.
    pub external_delta: f64,
    /// Whether the deferred amount had to be clamped to fit.
    pub clamped: bool,
    /// Whether capacity grew since the previous sync.
    pub capacity_grew: bool,
    /// Seconds covered by the sync.
    pub elapsed: f64,
}

// ---------------------------------------------------------------------------
// Resource ledger
// ---------------------------------------------------------------------------

/// Accounting record for one resource on one vessel.
#[derive(Debug)]
pub struct ResourceLedger {
    name: String,
    id: ResourceId,
    amount: f64,
    capacity: f64,
    deferred: f64,
    rate: f64,
    average_rate: f64,
    level: f64,
    pool: TankPool,
    /// Broker -> signed amount this tick.
    brokers: BTreeMap<Broker, f64>,
    /// Every direct intent this tick, including those too small to attribute.
    direct_total: f64,
    /// Broker -> simulated average rate of interval rules this tick.
    interval_brokers: BTreeMap<Broker, f64>,
    interval_amount: f64,
    published: Vec<BrokerShare>,
    last_sync: Option<SyncRecord>,
    /// Set after the first sync; until then the container amount is a
    /// baseline, not an external change.
    initialized: bool,
}

impl ResourceLedger {
    /// Create an empty ledger for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            id: ResourceId::from_name(name),
            amount: 0.0,
            capacity: 0.0,
            deferred: 0.0,
            rate: 0.0,
            average_rate: 0.0,
            level: 0.0,
            pool: TankPool::new(),
            brokers: BTreeMap::new(),
            direct_total: 0.0,
            interval_brokers: BTreeMap::new(),
            interval_amount: 0.0,
            published: Vec::new(),
            last_sync: None,
            initialized: false,
        }
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hashed resource id.
    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// Amount after the last sync.
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    /// Capacity after the last sync.
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Net intent accumulated since the last sync.
    pub const fn deferred(&self) -> f64 {
        self.deferred
    }

    /// Amount plus the intents not yet synced.
    pub const fn available(&self) -> f64 {
        self.amount + self.deferred
    }

    /// `amount / capacity`, 0 without capacity.
    pub const fn level(&self) -> f64 {
        self.level
    }

    /// Instantaneous rate over the last sync, units per second.
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Rate including the simulated averages of interval rules.
    pub const fn average_rate(&self) -> f64 {
        self.average_rate
    }

    /// Per-broker breakdown published by the last sync.
    pub fn brokers(&self) -> &[BrokerShare] {
        &self.published
    }

    /// Record of the last sync, if any.
    pub const fn last_sync(&self) -> Option<&SyncRecord> {
        self.last_sync.as_ref()
    }

    /// The pool rebuilt for this ledger during the last sync.
    pub const fn pool(&self) -> &TankPool {
        &self.pool
    }

    /// Record an intent to add `quantity`.
    pub fn produce(&mut self, quantity: f64, broker: &Broker) {
        if crate::is_valid_quantity(quantity) {
            self.record(quantity, broker);
        }
    }

    /// Record an intent to remove `quantity`.
    pub fn consume(&mut self, quantity: f64, broker: &Broker) {
        if crate::is_valid_quantity(quantity) {
            self.record(-quantity, broker);
        }
    }

    fn record(&mut self, signed: f64, broker: &Broker) {
        self.deferred += signed;
        self.direct_total += signed;
        if signed.abs() > EPSILON {
            if let Some(total) = self.brokers.get_mut(broker) {
                *total += signed;
            } else {
                self.brokers.insert(broker.clone(), signed);
            }
        }
    }

    /// Record the effect of a rule that does not run every tick.
    ///
    /// `amount` (signed) is applied with the rest of this tick's intents
    /// but excluded from the measured rate; `average_rate` is what the rule
    /// amounts to over time and feeds the average rate instead.
    pub fn update_interval_rule(&mut self, amount: f64, average_rate: f64, broker: &Broker) {
        if amount.is_finite() {
            self.deferred += amount;
            self.interval_amount += amount;
        }
        if average_rate.is_finite() {
            if let Some(total) = self.interval_brokers.get_mut(broker) {
                *total += average_rate;
            } else {
                self.interval_brokers.insert(broker.clone(), average_rate);
            }
        }
    }

    /// Forget the containers registered last tick.
    pub fn begin_rebuild(&mut self) {
        self.pool.reset();
    }

    /// Register the container at index `slot` of the slice later passed to
    /// [`sync`](Self::sync).
    pub fn register_container(&mut self, slot: usize, container: &dyn ContainerRef, priority: i32) {
        self.pool.register(slot, container, priority);
    }

    /// Reconcile this tick's intents against the containers.
    ///
    /// The pool must have been rebuilt with [`begin_rebuild`] and
    /// [`register_container`] over exactly `containers`.
    ///
    /// [`begin_rebuild`]: Self::begin_rebuild
    /// [`register_container`]: Self::register_container
    pub fn sync(
        &mut self,
        containers: &mut [&mut dyn ContainerRef],
        fidelity: Fidelity,
        ctx: &SyncContext<'_>,
    ) -> Option<CoherencyNotice> {
        let old_amount = self.amount;
        let old_capacity = self.capacity;

        self.amount = self.pool.amount();
        self.capacity = self.pool.max_amount();
        let baseline = self.amount;

        // A new ledger adopts whatever the containers hold.
        let external_delta = if self.initialized {
            baseline - old_amount
        } else {
            0.0
        };
        let capacity_grew = self.initialized && self.capacity - old_capacity > PRECISION_GUARD;
        let unsupported_amount = if external_delta.abs() < PRECISION_GUARD {
            0.0
        } else {
            external_delta
        };
        let unsupported_rate = if ctx.elapsed > 0.0 {
            unsupported_amount / ctx.elapsed
        } else {
            0.0
        };

        let requested = self.deferred;
        let applied = crate::clamp(requested, -self.amount, self.capacity - self.amount);
        let clamped = (applied - requested).abs() > EPSILON;
        if clamped {
            debug!(
                resource = %self.name,
                requested,
                applied,
                "Deferred amount clamped to container bounds"
            );
        }
        if applied.abs() > EPSILON {
            self.pool.apply_delta(applied, containers);
            self.amount = self.pool.amount();
        }
        self.deferred = 0.0;

        self.level = if self.capacity > 0.0 {
            self.amount / self.capacity
        } else {
            0.0
        };

        if ctx.elapsed <= 0.0 {
            self.rate = 0.0;
            self.average_rate = 0.0;
        } else if !ctx.blending {
            let rate_base = if self.initialized { old_amount } else { baseline };
            self.rate = (self.amount - rate_base - self.interval_amount) / ctx.elapsed;

            let interval_rate: f64 = self.interval_brokers.values().sum();
            self.average_rate = self.rate;
            let draining_nonempty = interval_rate < 0.0 && self.amount > EPSILON;
            let filling_nonfull = interval_rate > 0.0 && self.capacity - self.amount > EPSILON;
            if draining_nonempty || filling_nonfull {
                self.average_rate += interval_rate;
            }
        }

        self.last_sync = Some(SyncRecord {
            old_amount: if self.initialized { old_amount } else { baseline },
            new_amount: self.amount,
            contributions: self.direct_total,
            interval_amount: self.interval_amount,
            external_delta,
            clamped,
            capacity_grew,
            elapsed: ctx.elapsed,
        });

        self.publish(ctx, unsupported_rate);

        let notice = if ctx.coherency.enforced
            && fidelity == Fidelity::Full
            && ctx.acceleration > ctx.coherency.acceleration_threshold
            && unsupported_rate > 0.0
            && !capacity_grew
        {
            Some(CoherencyNotice {
                resource: self.name.clone(),
                unsupported_rate,
                max_acceleration: ctx.coherency.throttled_acceleration,
            })
        } else {
            None
        };

        self.initialized = true;
        notice
    }

    /// Replace the published breakdown and clear the tick maps.
    fn publish(&mut self, ctx: &SyncContext<'_>, unsupported_rate: f64) {
        self.published.clear();
        let per_second = if ctx.elapsed > 0.0 {
            1.0 / ctx.elapsed
        } else {
            0.0
        };
        for (broker, amount) in &self.brokers {
            self.published.push(broker.share(amount * per_second, false));
        }
        for (broker, rate) in &self.interval_brokers {
            self.published.push(broker.share(*rate, true));
        }
        if unsupported_rate.abs() > 0.0 {
            self.published
                .push(ctx.unsupported.share(unsupported_rate, false));
        }
        self.published
            .sort_by(|a, b| a.id.cmp(&b.id).then(a.averaged.cmp(&b.averaged)));

        self.brokers.clear();
        self.direct_total = 0.0;
        self.interval_brokers.clear();
        self.interval_amount = 0.0;
    }

    /// Seconds until empty at the current average rate.
    ///
    /// `Some(0.0)` when already empty, `None` when not draining.
    pub fn depletion_time(&self) -> Option<f64> {
        if self.amount <= EPSILON {
            Some(0.0)
        } else if self.average_rate >= -EPSILON {
            None
        } else {
            Some(self.amount / -self.average_rate)
        }
    }

    /// Owned snapshot for monitoring and UI.
    pub fn view(&self) -> LedgerView {
        LedgerView {
            resource: self.name.clone(),
            amount: self.amount,
            capacity: self.capacity,
            level: self.level,
            rate: self.rate,
            average_rate: self.average_rate,
            depletion_time: self.depletion_time(),
            brokers: self.published.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger set
// ---------------------------------------------------------------------------

/// All ledgers of one vessel, keyed by resource id and created on demand.
#[derive(Debug, Default)]
pub struct Ledgers {
    ledgers: BTreeMap<ResourceId, ResourceLedger>,
}

impl Ledgers {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            ledgers: BTreeMap::new(),
        }
    }

    /// Return the ledger for `resource`, creating it on first reference.
    pub fn get_or_create(&mut self, resource: &str) -> &mut ResourceLedger {
        self.ledgers
            .entry(ResourceId::from_name(resource))
            .or_insert_with(|| ResourceLedger::new(resource))
    }

    /// Look up an existing ledger.
    pub fn get(&self, resource: &str) -> Option<&ResourceLedger> {
        self.ledgers.get(&ResourceId::from_name(resource))
    }

    /// Look up an existing ledger by id.
    pub fn get_by_id(&self, id: ResourceId) -> Option<&ResourceLedger> {
        self.ledgers.get(&id)
    }

    /// Amount plus deferred intents, 0 for an unknown resource.
    pub fn available(&self, id: ResourceId) -> f64 {
        self.get_by_id(id).map_or(0.0, ResourceLedger::available)
    }

    /// Forget the containers registered into every pool last tick.
    pub fn begin_rebuild(&mut self) {
        for ledger in self.ledgers.values_mut() {
            ledger.begin_rebuild();
        }
    }

    /// Number of ledgers.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Whether no resource has been referenced yet.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    /// Iterate ledgers in resource id order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceLedger> {
        self.ledgers.values()
    }

    /// Iterate ledgers mutably in resource id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ResourceId, &mut ResourceLedger)> {
        self.ledgers.iter_mut()
    }
}
