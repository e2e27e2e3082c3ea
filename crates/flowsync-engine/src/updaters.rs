//! Demo producers and consumers attached to the spawned fleet.
//!
//! - [`SolarPanel`] produces charge while the vessel is sunlit.
//! - [`LifeSupport`] runs a crew recipe with a combined food input and a
//!   hunger cure.
//! - [`Scrubber`] removes carbon dioxide in discrete cycles through an
//!   interval rule.
//! - [`ExternalWriter`] edits a container directly, the way a third-party
//!   mod would, so the coherency guard has something to catch.

use flowsync_core::updater::{ResourceUpdater, UpdateContext, UpdateError};
use flowsync_ledger::{Broker, ContainerRef, Recipe, ResourceHost, VesselResources};
use flowsync_world::Vessel;
use tracing::debug;

/// Charge.
pub const ELECTRIC_CHARGE: &str = "ElectricCharge";
/// Breathable oxygen.
pub const OXYGEN: &str = "Oxygen";
/// Exhaled carbon dioxide.
pub const CARBON_DIOXIDE: &str = "CarbonDioxide";
/// Fresh food, consumed first.
pub const FOOD: &str = "Food";
/// Preserved rations, consumed when food runs out.
pub const RATIONS: &str = "Rations";
/// Ore mined by drills.
pub const ORE: &str = "Ore";
/// Crew rule raised over time and cured by eating.
pub const HUNGER: &str = "hunger";

// ---------------------------------------------------------------------------
// Solar panel
// ---------------------------------------------------------------------------

/// Produces charge during the sunlit part of an orbit.
#[derive(Debug, Clone)]
pub struct SolarPanel {
    /// Attribution.
    pub broker: Broker,
    /// Charge per second in sunlight.
    pub output: f64,
    /// Orbital period in seconds.
    pub period: f64,
    /// Fraction of the orbit spent in sunlight.
    pub sunlit_fraction: f64,
}

impl SolarPanel {
    fn exposure(&self, sim_time: f64) -> f64 {
        if self.period <= 0.0 {
            return 1.0;
        }
        let phase = sim_time.rem_euclid(self.period) / self.period;
        if phase < self.sunlit_fraction { 1.0 } else { 0.0 }
    }
}

impl ResourceUpdater for SolarPanel {
    fn name(&self) -> &str {
        "solar_panel"
    }

    fn update(
        &mut self,
        _vessel: &mut Vessel,
        resources: &mut VesselResources,
        ctx: &UpdateContext,
    ) -> Result<(), UpdateError> {
        let produced = self.output * ctx.elapsed * self.exposure(ctx.sim_time);
        resources.produce(ELECTRIC_CHARGE, produced, &self.broker);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Life support
// ---------------------------------------------------------------------------

/// Per-crew life support: eats, breathes, and cures hunger.
#[derive(Debug, Clone)]
pub struct LifeSupport {
    /// Attribution.
    pub broker: Broker,
    /// Food (or rations) per crew member per second.
    pub food_rate: f64,
    /// Oxygen per crew member per second.
    pub oxygen_rate: f64,
    /// Carbon dioxide exhaled per unit of oxygen.
    pub co2_ratio: f64,
    /// Hunger gained per crew member per second.
    pub hunger_rate: f64,
}

impl ResourceUpdater for LifeSupport {
    fn name(&self) -> &str {
        "life_support"
    }

    fn update(
        &mut self,
        vessel: &mut Vessel,
        resources: &mut VesselResources,
        ctx: &UpdateContext,
    ) -> Result<(), UpdateError> {
        let crew = vessel.crew.len();
        if crew == 0 || ctx.elapsed <= 0.0 {
            return Ok(());
        }
        let crew = f64::from(u32::try_from(crew).unwrap_or(u32::MAX));

        vessel.crew.accumulate(HUNGER, self.hunger_rate * ctx.elapsed);

        let food = self.food_rate * crew * ctx.elapsed;
        let oxygen = self.oxygen_rate * crew * ctx.elapsed;
        let mut recipe = Recipe::new(self.broker.clone());
        recipe.add_combined_input(FOOD, food * 0.5, RATIONS, food * 0.5)?;
        recipe.add_input(OXYGEN, oxygen)?;
        recipe.add_output(CARBON_DIOXIDE, oxygen * self.co2_ratio, true)?;
        recipe.add_cure(HUNGER, self.hunger_rate * crew * ctx.elapsed)?;
        resources.add_recipe(recipe);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scrubber
// ---------------------------------------------------------------------------

/// Removes carbon dioxide once per cycle.
///
/// The removal is reported as an interval rule: the amount lands only on
/// the tick that completes a cycle, while the average rate is published
/// every tick.
#[derive(Debug, Clone)]
pub struct Scrubber {
    /// Attribution.
    pub broker: Broker,
    /// Seconds per cycle.
    pub interval: f64,
    /// Carbon dioxide removed per cycle.
    pub capacity: f64,
    /// Seconds into the current cycle.
    pub progress: f64,
}

impl ResourceUpdater for Scrubber {
    fn name(&self) -> &str {
        "scrubber"
    }

    fn update(
        &mut self,
        _vessel: &mut Vessel,
        resources: &mut VesselResources,
        ctx: &UpdateContext,
    ) -> Result<(), UpdateError> {
        if self.interval <= 0.0 {
            return Ok(());
        }
        self.progress += ctx.elapsed;
        let cycles = (self.progress / self.interval).floor();
        self.progress -= cycles * self.interval;

        let available = resources.get(CARBON_DIOXIDE).map_or(0.0, |l| l.amount() + l.deferred());
        let removed = (self.capacity * cycles).min(available.max(0.0));
        if removed > 0.0 {
            debug!(tick = ctx.tick, removed, "Scrubber cycle complete");
        }
        resources
            .ledger(CARBON_DIOXIDE)
            .update_interval_rule(-removed, -self.capacity / self.interval, &self.broker);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// External writer
// ---------------------------------------------------------------------------

/// Adds resource straight into a container every `every_ticks` ticks,
/// bypassing the ledger.
#[derive(Debug, Clone)]
pub struct ExternalWriter {
    /// Resource to write.
    pub resource: String,
    /// Amount added per write.
    pub amount: f64,
    /// Write period in ticks.
    pub every_ticks: u64,
}

impl ResourceUpdater for ExternalWriter {
    fn name(&self) -> &str {
        "external_writer"
    }

    fn update(
        &mut self,
        vessel: &mut Vessel,
        _resources: &mut VesselResources,
        ctx: &UpdateContext,
    ) -> Result<(), UpdateError> {
        if ctx.tick.checked_rem(self.every_ticks) != Some(0) {
            return Ok(());
        }
        let mut containers = vessel.containers();
        let slot = containers
            .iter_mut()
            .find(|s| s.resource == self.resource)
            .ok_or_else(|| UpdateError::Missing {
                what: format!("a {} container", self.resource),
            })?;
        let container: &mut dyn ContainerRef = &mut *slot.container;
        let written = (container.amount() + self.amount).min(container.max_amount());
        container.set_amount(written);
        Ok(())
    }
}
