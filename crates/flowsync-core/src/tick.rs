//! Tick cycle: the engine loop that drives every vessel's resources.
//!
//! Each tick runs through these phases:
//!
//! 1. **Clock** -- advance the clock and derive elapsed time, acceleration,
//!    and the blending flag.
//!
//! 2. **Update** -- for every vessel, run its [`ResourceUpdater`]s, which
//!    record produce/consume intents, recipes, and interval rules.
//!
//! 3. **Sync** -- [`VesselResources::sync`] runs the recipes and reconciles
//!    every ledger against the vessel's containers.
//!
//! 4. **Verify** -- each ledger's last sync is checked for conservation;
//!    anomalies are logged and reported.
//!
//! 5. **Guard** -- coherency notices raised during the sync cap the clock's
//!    acceleration for the following ticks.
//!
//! The tick cycle is deterministic given the same initial state and
//! updaters.
//!
//! [`ResourceUpdater`]: crate::updater::ResourceUpdater

use std::collections::BTreeMap;

use flowsync_ledger::{
    BrokerRegistry, CoherencyNotice, ConservationResult, LedgerAnomaly, ResourceCache,
    SyncContext, VesselResources, verify_sync,
};
use flowsync_types::VesselId;
use flowsync_world::Vessel;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimClock};
use crate::config::{FlowConfig, SimulationConfig};
use crate::updater::{ResourceUpdater, UpdateContext};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated seconds covered by the tick.
    pub elapsed: f64,
    /// Effective acceleration during the tick.
    pub acceleration: f64,
    /// Whether the tick was blended (rates not recomputed).
    pub blending: bool,
    /// Vessels synchronized.
    pub vessels: usize,
    /// Recipes executed across all vessels.
    pub recipes_executed: usize,
    /// Updaters that reported an error and were skipped.
    pub updater_failures: usize,
    /// Coherency notices raised this tick.
    pub notices: Vec<CoherencyNotice>,
    /// Conservation anomalies detected this tick.
    #[serde(skip)]
    pub anomalies: Vec<LedgerAnomaly>,
    /// Whether the guard lowered the acceleration for the next tick.
    pub throttled: bool,
}

/// The mutable simulation state passed through the tick cycle.
pub struct SimulationState {
    /// The simulation clock.
    pub clock: SimClock,
    /// Flow mode and guard settings.
    pub flow: FlowConfig,
    /// Interned attribution brokers.
    pub brokers: BrokerRegistry,
    /// Resource registries by vessel.
    pub cache: ResourceCache,
    /// Simulated vessels.
    pub vessels: BTreeMap<VesselId, Vessel>,
    updaters: BTreeMap<VesselId, Vec<Box<dyn ResourceUpdater>>>,
}

impl core::fmt::Debug for SimulationState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationState")
            .field("clock", &self.clock)
            .field("flow", &self.flow)
            .field("brokers", &self.brokers.len())
            .field("cache", &self.cache.len())
            .field("vessels", &self.vessels.len())
            .field("updaters", &self.updater_count())
            .finish()
    }
}

impl SimulationState {
    /// Create an empty state from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the time settings are invalid.
    pub fn new(config: &SimulationConfig) -> Result<Self, ClockError> {
        Ok(Self {
            clock: SimClock::new(&config.time)?,
            flow: config.flow.clone(),
            brokers: BrokerRegistry::new(),
            cache: ResourceCache::new(),
            vessels: BTreeMap::new(),
            updaters: BTreeMap::new(),
        })
    }

    /// Add a vessel. Returns its id.
    pub fn add_vessel(&mut self, vessel: Vessel) -> VesselId {
        let id = vessel.id;
        info!(vessel = %id, name = %vessel.name, loaded = vessel.is_loaded(), "Vessel added");
        self.vessels.insert(id, vessel);
        id
    }

    /// Remove a vessel together with its updaters and cached ledgers.
    pub fn remove_vessel(&mut self, id: VesselId) -> Option<Vessel> {
        let vessel = self.vessels.remove(&id)?;
        self.updaters.remove(&id);
        let purged = self.cache.purge(id);
        info!(vessel = %id, purged, "Vessel removed");
        Some(vessel)
    }

    /// Attach an updater to a vessel. Returns `false` if the vessel is unknown.
    pub fn add_updater(&mut self, id: VesselId, updater: Box<dyn ResourceUpdater>) -> bool {
        if !self.vessels.contains_key(&id) {
            return false;
        }
        self.updaters.entry(id).or_default().push(updater);
        true
    }

    /// Total number of attached updaters.
    pub fn updater_count(&self) -> usize {
        self.updaters.values().map(Vec::len).sum()
    }

    /// Resource registry of a vessel, if it has synced at least once.
    pub fn resources(&self, id: VesselId) -> Option<&VesselResources> {
        self.cache.get(id)
    }

    /// Drop every cached ledger; the next tick re-adopts container amounts.
    pub fn reset(&mut self) {
        self.cache.clear();
        info!(vessels = self.vessels.len(), "Resource cache reset");
    }
}

/// Execute a single tick.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if the clock cannot advance.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    // --- Phase 1: Clock ---
    let tick = state.clock.advance()?;
    let update_ctx = UpdateContext {
        tick,
        elapsed: state.clock.elapsed(),
        sim_time: state.clock.sim_time(),
    };
    let sync_ctx = SyncContext {
        elapsed: update_ctx.elapsed,
        acceleration: state.clock.acceleration(),
        blending: state.clock.is_blending(),
        priority_flow: state.flow.priority_flow,
        coherency: state.flow.coherency_policy(),
        unsupported: state.brokers.unsupported(),
    };
    debug!(
        tick,
        elapsed = sync_ctx.elapsed,
        acceleration = sync_ctx.acceleration,
        blending = sync_ctx.blending,
        "Tick started"
    );

    let mut recipes_executed: usize = 0;
    let mut updater_failures: usize = 0;
    let mut notices = Vec::new();
    let mut anomalies = Vec::new();

    for (id, vessel) in &mut state.vessels {
        let resources = state.cache.get_or_create(*id);

        // --- Phase 2: Update ---
        if let Some(updaters) = state.updaters.get_mut(id) {
            for updater in updaters.iter_mut() {
                if let Err(err) = updater.update(vessel, resources, &update_ctx) {
                    warn!(tick, vessel = %id, updater = updater.name(), error = %err, "Updater failed");
                    updater_failures = updater_failures.saturating_add(1);
                }
            }
        }

        // --- Phase 3: Sync ---
        let report = resources.sync(vessel, &sync_ctx);
        recipes_executed = recipes_executed.saturating_add(report.recipes_executed);

        // --- Phase 4: Verify ---
        for ledger in resources.ledgers().iter() {
            let Some(record) = ledger.last_sync() else {
                continue;
            };
            if let ConservationResult::Anomaly(anomaly) = verify_sync(ledger.name(), record) {
                warn!(tick, vessel = %id, %anomaly, "Conservation check failed");
                anomalies.push(anomaly);
            }
        }

        for notice in &report.notices {
            warn!(tick, vessel = %id, %notice, "Coherency guard triggered");
        }
        notices.extend(report.notices);
    }

    // --- Phase 5: Guard ---
    let throttle_to = notices
        .iter()
        .map(|n| n.max_acceleration)
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.min(m))));
    let throttled = throttle_to.is_some_and(|max| state.clock.throttle(max));
    if throttled {
        warn!(
            tick,
            acceleration = state.clock.acceleration(),
            "Time acceleration throttled"
        );
    }

    let summary = TickSummary {
        tick,
        elapsed: sync_ctx.elapsed,
        acceleration: sync_ctx.acceleration,
        blending: sync_ctx.blending,
        vessels: state.vessels.len(),
        recipes_executed,
        updater_failures,
        notices,
        anomalies,
        throttled,
    };

    info!(
        tick,
        vessels = summary.vessels,
        recipes = summary.recipes_executed,
        notices = summary.notices.len(),
        anomalies = summary.anomalies.len(),
        "Tick complete"
    );

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use flowsync_ledger::{Broker, Recipe};
    use flowsync_types::BrokerCategory;
    use flowsync_world::Part;

    use super::*;
    use crate::config::TimeConfig;
    use crate::updater::UpdateError;

    fn config(acceleration: f64) -> SimulationConfig {
        SimulationConfig {
            time: TimeConfig {
                tick_seconds: 1.0,
                acceleration,
                blending_ticks: 0,
                max_ticks: 0,
            },
            ..SimulationConfig::default()
        }
    }

    fn state(acceleration: f64) -> SimulationState {
        SimulationState::new(&config(acceleration))
            .unwrap()
    }

    fn battery_vessel(amount: f64) -> Vessel {
        let mut vessel = Vessel::new("Probe");
        let part = Part::new("Battery")
            .with_resource("ElectricCharge", amount, 100.0, 0)
            .unwrap();
        vessel.attach(part);
        vessel
    }

    struct Drain {
        broker: Broker,
        rate: f64,
    }

    impl ResourceUpdater for Drain {
        fn name(&self) -> &str {
            "drain"
        }

        fn update(
            &mut self,
            _vessel: &mut Vessel,
            resources: &mut VesselResources,
            ctx: &UpdateContext,
        ) -> Result<(), UpdateError> {
            resources.consume("ElectricCharge", self.rate * ctx.elapsed, &self.broker);
            Ok(())
        }
    }

    struct Leak;

    impl ResourceUpdater for Leak {
        fn name(&self) -> &str {
            "leak"
        }

        fn update(
            &mut self,
            vessel: &mut Vessel,
            _resources: &mut VesselResources,
            _ctx: &UpdateContext,
        ) -> Result<(), UpdateError> {
            let tank = vessel
                .parts
                .first_mut()
                .and_then(|p| p.resource_mut("ElectricCharge"))
                .ok_or_else(|| UpdateError::Missing {
                    what: "a battery".to_owned(),
                })?;
            let amount = flowsync_ledger::ContainerRef::amount(&tank.tank);
            flowsync_ledger::ContainerRef::set_amount(&mut tank.tank, amount + 1.0);
            Ok(())
        }
    }

    struct Broken {
        broker: Broker,
    }

    impl ResourceUpdater for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn update(
            &mut self,
            _vessel: &mut Vessel,
            _resources: &mut VesselResources,
            _ctx: &UpdateContext,
        ) -> Result<(), UpdateError> {
            let mut recipe = Recipe::new(self.broker.clone());
            recipe.add_input("ElectricCharge", 0.0)?;
            Ok(())
        }
    }

    #[test]
    fn updaters_run_before_sync() {
        let mut state = state(1.0);
        let broker = state
            .brokers
            .get_or_create("drain", BrokerCategory::VesselSystem, "Drain");
        let id = state.add_vessel(battery_vessel(50.0));
        assert!(state.add_updater(id, Box::new(Drain { broker, rate: 2.0 })));

        for _ in 0..3 {
            run_tick(&mut state).unwrap();
        }

        let view = state.resources(id).and_then(|r| r.ledger_view("ElectricCharge"));
        assert!(view.is_some_and(|v| (v.amount - 44.0).abs() < 1e-9 && (v.rate + 2.0).abs() < 1e-9));
    }

    #[test]
    fn external_writer_throttles_high_acceleration() {
        let mut state = state(10_000.0);
        let id = state.add_vessel(battery_vessel(10.0));
        assert!(state.add_updater(id, Box::new(Leak)));

        let first = run_tick(&mut state).unwrap();
        // The first sync adopts the baseline; the leak shows up as its own
        // external change only from the second tick on.
        assert!(first.notices.is_empty());
        assert!(!first.throttled);

        let second = run_tick(&mut state).unwrap();
        assert_eq!(second.notices.len(), 1);
        assert!(second.throttled);
        assert!((state.clock.acceleration() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn guard_disabled_never_throttles() {
        let mut state = state(10_000.0);
        state.flow.coherency_enforced = false;
        let id = state.add_vessel(battery_vessel(10.0));
        assert!(state.add_updater(id, Box::new(Leak)));

        for _ in 0..3 {
            let summary = run_tick(&mut state).unwrap();
            assert!(summary.notices.is_empty());
            assert!(summary.anomalies.is_empty());
        }
        assert!((state.clock.acceleration() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failing_updater_is_skipped() {
        let mut state = state(1.0);
        let id = state.add_vessel(battery_vessel(10.0));
        let broker = state.brokers.generic().clone();
        assert!(state.add_updater(id, Box::new(Broken { broker })));

        let summary = run_tick(&mut state).unwrap();
        assert_eq!(summary.updater_failures, 1);
        assert_eq!(summary.vessels, 1);
    }

    #[test]
    fn unknown_vessel_rejects_updater() {
        let mut state = state(1.0);
        assert!(!state.add_updater(VesselId::new(), Box::new(Leak)));
        assert_eq!(state.updater_count(), 0);
    }

    #[test]
    fn remove_vessel_purges_cache() {
        let mut state = state(1.0);
        let id = state.add_vessel(battery_vessel(10.0));
        assert!(state.add_updater(id, Box::new(Leak)));
        run_tick(&mut state).unwrap();
        assert_eq!(state.cache.len(), 1);

        assert!(state.remove_vessel(id).is_some());
        assert!(state.cache.is_empty());
        assert_eq!(state.updater_count(), 0);
        assert!(state.remove_vessel(id).is_none());
    }

    #[test]
    fn reset_readopts_baseline() {
        let mut state = state(10_000.0);
        let id = state.add_vessel(battery_vessel(10.0));
        run_tick(&mut state).unwrap();

        // Edit the tank while the cache is dropped: no external change is seen.
        state.reset();
        let tank = state
            .vessels
            .get_mut(&id)
            .and_then(|v| v.parts.first_mut())
            .and_then(|p| p.resource_mut("ElectricCharge"));
        if let Some(r) = tank {
            r.tank = flowsync_world::LiveTank::new(60.0, 100.0);
        }
        let summary = run_tick(&mut state).unwrap();
        assert!(summary.notices.is_empty());
        let view = state.resources(id).and_then(|r| r.ledger_view("ElectricCharge"));
        assert!(view.is_some_and(|v| (v.amount - 60.0).abs() < 1e-9));
    }
}
