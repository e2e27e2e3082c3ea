//! Fleet spawner for seeding the demo simulation.
//!
//! At startup the spawner creates N vessels with seeded random tank levels
//! and crew, unloads some of them so both container adapters are exercised,
//! and attaches the demo updaters. The same seed always produces the same
//! fleet (vessel ids aside).

use flowsync_core::config::WorldConfig;
use flowsync_core::tick::SimulationState;
use flowsync_core::updater::ResourceUpdater;
use flowsync_types::{BrokerCategory, VesselId};
use flowsync_world::{Part, Vessel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::EngineError;
use crate::updaters::{
    CARBON_DIOXIDE, ELECTRIC_CHARGE, ExternalWriter, FOOD, LifeSupport, ORE, OXYGEN, RATIONS,
    Scrubber, SolarPanel,
};

// -----------------------------------------------------------------------
// Name pools
// -----------------------------------------------------------------------

/// Vessel names, used in order and suffixed once exhausted.
const VESSEL_NAMES: &[&str] = &[
    "Aurora", "Borealis", "Corvid", "Dragonfly", "Eos", "Falcon", "Gannet", "Heron",
    "Ibis", "Jaeger", "Kestrel", "Lark",
];

/// Crew names, picked at random.
const CREW_NAMES: &[&str] = &[
    "Jebediah", "Bill", "Bob", "Valentina", "Tavie", "Lodan", "Mortimer", "Gus",
];

/// Seconds per orbit used by every solar panel.
const ORBIT_PERIOD: f64 = 1800.0;

// -----------------------------------------------------------------------
// Spawning result
// -----------------------------------------------------------------------

/// What the spawner put into the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSummary {
    /// Spawned vessel ids in creation order.
    pub vessels: Vec<VesselId>,
    /// Vessels left loaded (live parts).
    pub loaded: usize,
    /// Crew members boarded across the fleet.
    pub crew: usize,
    /// Updaters attached across the fleet.
    pub updaters: usize,
}

/// Spawn the demo fleet into `state`.
///
/// The first vessel also carries an [`ExternalWriter`] that drops ore into
/// its bay every ten ticks.
///
/// # Errors
///
/// Returns [`EngineError::Spawner`] if the fleet size is zero, or
/// [`EngineError::World`] if a demo part is invalid.
pub fn spawn_fleet(config: &WorldConfig, state: &mut SimulationState) -> Result<FleetSummary, EngineError> {
    if config.vessels == 0 {
        return Err(EngineError::Spawner {
            message: "world.vessels must be at least 1".to_owned(),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut summary = FleetSummary {
        vessels: Vec::new(),
        loaded: 0,
        crew: 0,
        updaters: 0,
    };

    for index in 0..config.vessels {
        let vessel = build_vessel(&mut rng, index)?;
        let loaded = vessel.is_loaded();
        let crew = vessel.crew.len();
        let id = state.add_vessel(vessel);

        let mut updaters = demo_updaters(state, &mut rng);
        if index == 0 {
            updaters.push(Box::new(ExternalWriter {
                resource: ORE.to_owned(),
                amount: 0.5,
                every_ticks: 10,
            }));
        }
        for updater in updaters {
            if state.add_updater(id, updater) {
                summary.updaters = summary.updaters.saturating_add(1);
            }
        }

        if loaded {
            summary.loaded = summary.loaded.saturating_add(1);
        }
        summary.crew = summary.crew.saturating_add(crew);
        summary.vessels.push(id);
    }

    info!(
        vessels = summary.vessels.len(),
        loaded = summary.loaded,
        crew = summary.crew,
        updaters = summary.updaters,
        "Fleet spawned"
    );
    Ok(summary)
}

/// Build one vessel with seeded tank levels and crew.
fn build_vessel(rng: &mut StdRng, index: u32) -> Result<Vessel, EngineError> {
    let name = vessel_name(index);
    let mut vessel = Vessel::new(&name);

    vessel.attach(
        Part::new("Battery bank")
            .with_resource(ELECTRIC_CHARGE, rng.random_range(20.0..100.0), 100.0, 0)?,
    );
    vessel.attach(
        Part::new("Reserve battery").with_resource(ELECTRIC_CHARGE, 50.0, 50.0, 1)?,
    );
    vessel.attach(
        Part::new("Habitat")
            .with_resource(FOOD, rng.random_range(0.0..20.0), 20.0, 0)?
            .with_resource(RATIONS, 20.0, 20.0, 0)?
            .with_resource(OXYGEN, rng.random_range(50.0..100.0), 100.0, 0)?
            .with_resource(CARBON_DIOXIDE, 0.0, 50.0, 0)?,
    );
    vessel.attach(Part::new("Ore bay").with_resource(ORE, 0.0, 50.0, 0)?);

    let crew = rng.random_range(1..=3_usize);
    for _ in 0..crew {
        let pick = rng.random_range(0..CREW_NAMES.len());
        vessel.crew.board(CREW_NAMES.get(pick).copied().unwrap_or("Kerman"));
    }

    // Keep the first vessel loaded so the coherency guard can see it.
    if index > 0 && rng.random_bool(0.5) {
        vessel.unload();
    }
    Ok(vessel)
}

fn vessel_name(index: u32) -> String {
    let count = VESSEL_NAMES.len();
    let position = usize::try_from(index).unwrap_or(usize::MAX);
    let base = position.checked_rem(count).and_then(|i| VESSEL_NAMES.get(i)).copied().unwrap_or("Vessel");
    let lap = position.checked_div(count).unwrap_or(0);
    if lap == 0 {
        base.to_owned()
    } else {
        format!("{base} {}", lap.saturating_add(1))
    }
}

/// The updaters every demo vessel carries.
fn demo_updaters(state: &mut SimulationState, rng: &mut StdRng) -> Vec<Box<dyn ResourceUpdater>> {
    let panel = state
        .brokers
        .get_or_create("solar_panel", BrokerCategory::SolarPanel, "Solar panel");
    let life_support = state
        .brokers
        .get_or_create("life_support", BrokerCategory::Eclss, "Life support");
    let scrubber = state
        .brokers
        .get_or_create("co2_scrubber", BrokerCategory::Eclss, "CO2 scrubber");

    let solar: Box<dyn ResourceUpdater> = Box::new(SolarPanel {
        broker: panel,
        output: rng.random_range(1.0..3.0),
        period: ORBIT_PERIOD,
        sunlit_fraction: 0.6,
    });
    let eclss: Box<dyn ResourceUpdater> = Box::new(LifeSupport {
        broker: life_support,
        food_rate: 0.000_5,
        oxygen_rate: 0.002,
        co2_ratio: 0.9,
        hunger_rate: 0.000_1,
    });
    let scrubber: Box<dyn ResourceUpdater> = Box::new(Scrubber {
        broker: scrubber,
        interval: 60.0,
        capacity: 0.1,
        progress: 0.0,
    });
    vec![solar, eclss, scrubber]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use flowsync_core::config::SimulationConfig;

    use super::*;

    fn fresh_state() -> SimulationState {
        SimulationState::new(&SimulationConfig::default())
            .unwrap()
    }

    fn world(seed: u64, vessels: u32) -> WorldConfig {
        WorldConfig {
            name: "Test".to_owned(),
            seed,
            vessels,
        }
    }

    #[test]
    fn spawns_requested_fleet() {
        let mut state = fresh_state();
        let summary = spawn_fleet(&world(7, 4), &mut state).unwrap();

        assert_eq!(summary.vessels.len(), 4);
        assert_eq!(state.vessels.len(), 4);
        // Three demo updaters each, plus the external writer on the first.
        assert_eq!(summary.updaters, 13);
        assert_eq!(state.updater_count(), 13);
        assert!(summary.loaded >= 1);
        assert!(summary.crew >= 4);
    }

    #[test]
    fn same_seed_same_fleet() {
        let levels = |seed: u64| {
            let mut state = fresh_state();
            spawn_fleet(&world(seed, 5), &mut state).unwrap();
            let mut out: Vec<(String, bool, u64)> = state
                .vessels
                .values()
                .map(|v| {
                    let oxygen = v.amount_of(OXYGEN);
                    (v.name.clone(), v.is_loaded(), oxygen.to_bits())
                })
                .collect();
            out.sort();
            out
        };

        assert_eq!(levels(99), levels(99));
        assert_ne!(levels(99), levels(100));
    }

    #[test]
    fn zero_vessels_is_an_error() {
        let mut state = fresh_state();
        assert!(matches!(
            spawn_fleet(&world(1, 0), &mut state),
            Err(EngineError::Spawner { .. })
        ));
    }

    #[test]
    fn names_wrap_with_suffix() {
        assert_eq!(vessel_name(0), "Aurora");
        assert_eq!(vessel_name(12), "Aurora 2");
        assert_eq!(vessel_name(25), "Borealis 3");
    }
}
