//! Conversion recipes and the fixed-point batch solver.
//!
//! A [`Recipe`] turns inputs into outputs proportionally. Each step runs as
//! much of the recipe as the scarcest input and the fullest non-dumping
//! output allow, records the resulting intents on the ledgers, and
//! decreases the fraction `left` still to execute.
//!
//! [`execute_recipes`] steps every unfinished recipe of a batch, over and
//! over, until a whole pass makes no progress. Because intents are visible
//! to later steps through `amount + deferred`, a chain where recipe A feeds
//! recipe B resolves within the same tick whatever order they were queued
//! in.
//!
//! # Combined inputs
//!
//! A combined input pairs a primary resource with a secondary one that can
//! stand in for it. Availability is taken from the primary when it has any,
//! otherwise from the secondary. When consuming, the primary is charged
//! the quantities of both halves; whatever it cannot cover is charged to
//! the secondary.

use flowsync_types::ResourceId;
use tracing::trace;

use crate::{Broker, CrewAccumulators, EPSILON, FlowError, Ledgers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pairing {
    Plain,
    /// Primary half; the index points at the secondary entry in `inputs`.
    Primary(usize),
    /// Secondary half; metered and consumed through its primary.
    Secondary,
}

/// One resource on either side of a recipe.
#[derive(Debug, Clone)]
struct RecipeEntry {
    resource: String,
    id: ResourceId,
    quantity: f64,
    inv_quantity: f64,
    dump: bool,
    pairing: Pairing,
}

impl RecipeEntry {
    fn new(resource: &str, quantity: f64, dump: bool, pairing: Pairing) -> Result<Self, FlowError> {
        if !crate::is_valid_quantity(quantity) {
            return Err(FlowError::NonPositiveQuantity {
                resource: resource.to_owned(),
                quantity,
            });
        }
        Ok(Self {
            resource: resource.to_owned(),
            id: ResourceId::from_name(resource),
            quantity,
            inv_quantity: 1.0 / quantity,
            dump,
            pairing,
        })
    }

    /// Fraction of one recipe unit the ledger can currently supply.
    fn input_fraction(&self, ledgers: &Ledgers, cap: f64) -> f64 {
        crate::clamp(ledgers.available(self.id) * self.inv_quantity, 0.0, cap)
    }

    /// Fraction of one recipe unit the ledger can still absorb.
    fn output_fraction(&self, ledgers: &Ledgers, cap: f64) -> f64 {
        let headroom = ledgers
            .get_by_id(self.id)
            .map_or(0.0, |l| l.capacity() - l.amount() - l.deferred());
        crate::clamp(headroom * self.inv_quantity, 0.0, cap)
    }
}

/// A crew accumulator reduced by a recipe.
#[derive(Debug, Clone)]
struct CureEntry {
    rule: String,
    quantity: f64,
}

/// An input/output conversion queued for one tick.
#[derive(Debug, Clone)]
pub struct Recipe {
    broker: Broker,
    inputs: Vec<RecipeEntry>,
    outputs: Vec<RecipeEntry>,
    cures: Vec<CureEntry>,
    left: f64,
}

impl Recipe {
    /// Start an empty recipe whose intents are attributed to `broker`.
    pub const fn new(broker: Broker) -> Self {
        Self {
            broker,
            inputs: Vec::new(),
            outputs: Vec::new(),
            cures: Vec::new(),
            left: 1.0,
        }
    }

    /// Consume `quantity` of `resource` per recipe unit.
    pub fn add_input(&mut self, resource: &str, quantity: f64) -> Result<(), FlowError> {
        let entry = RecipeEntry::new(resource, quantity, false, Pairing::Plain)?;
        self.inputs.push(entry);
        Ok(())
    }

    /// Consume `primary`, falling back to `secondary` when the primary runs
    /// out.
    pub fn add_combined_input(
        &mut self,
        primary: &str,
        primary_quantity: f64,
        secondary: &str,
        secondary_quantity: f64,
    ) -> Result<(), FlowError> {
        if primary == secondary {
            return Err(FlowError::SelfPaired {
                resource: primary.to_owned(),
            });
        }
        let secondary_index = self.inputs.len().saturating_add(1);
        let primary_entry =
            RecipeEntry::new(primary, primary_quantity, false, Pairing::Primary(secondary_index))?;
        let secondary_entry =
            RecipeEntry::new(secondary, secondary_quantity, false, Pairing::Secondary)?;
        self.inputs.push(primary_entry);
        self.inputs.push(secondary_entry);
        Ok(())
    }

    /// Produce `quantity` of `resource` per recipe unit.
    ///
    /// A dumping output never limits the recipe: what does not fit is
    /// vented.
    pub fn add_output(&mut self, resource: &str, quantity: f64, dump: bool) -> Result<(), FlowError> {
        let entry = RecipeEntry::new(resource, quantity, dump, Pairing::Plain)?;
        self.outputs.push(entry);
        Ok(())
    }

    /// Reduce the crew accumulator `rule` by `quantity` per recipe unit,
    /// split evenly across eligible crew members.
    pub fn add_cure(&mut self, rule: &str, quantity: f64) -> Result<(), FlowError> {
        if !crate::is_valid_quantity(quantity) {
            return Err(FlowError::NonPositiveQuantity {
                resource: rule.to_owned(),
                quantity,
            });
        }
        self.cures.push(CureEntry {
            rule: rule.to_owned(),
            quantity,
        });
        Ok(())
    }

    /// Fraction of the recipe still to execute, in `[0, 1]`.
    pub const fn left(&self) -> f64 {
        self.left
    }

    /// Broker the recipe's intents are attributed to.
    pub const fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Whether the recipe has nothing left to do.
    pub fn is_finished(&self) -> bool {
        self.left <= EPSILON
    }

    /// Run as much of the recipe as the ledgers allow.
    ///
    /// Returns whether any progress was made.
    pub fn execute_step(
        &mut self,
        ledgers: &mut Ledgers,
        crew: Option<&mut (dyn CrewAccumulators + '_)>,
    ) -> bool {
        let io = self.worst_input(ledgers).min(self.worst_output(ledgers));

        self.consume_inputs(ledgers, io);
        for output in &self.outputs {
            ledgers
                .get_or_create(&output.resource)
                .produce(output.quantity * io, &self.broker);
        }
        if let Some(crew) = crew {
            self.apply_cures(crew, io);
        }

        self.left -= io;
        trace!(broker = self.broker.id(), io, left = self.left, "Recipe step");
        io > EPSILON
    }

    fn worst_input(&self, ledgers: &Ledgers) -> f64 {
        let mut worst = self.left;
        // Pure consumption may overdraw; the ledger clamps it at sync.
        if self.outputs.is_empty() {
            return worst;
        }
        for entry in &self.inputs {
            match entry.pairing {
                Pairing::Plain => worst = entry.input_fraction(ledgers, worst),
                Pairing::Primary(secondary) => {
                    let primary = entry.input_fraction(ledgers, worst);
                    if primary > 0.0 {
                        worst = primary;
                    } else if let Some(secondary) = self.inputs.get(secondary) {
                        worst = secondary.input_fraction(ledgers, worst);
                    }
                }
                Pairing::Secondary => {}
            }
        }
        worst
    }

    fn worst_output(&self, ledgers: &Ledgers) -> f64 {
        let mut worst = self.left;
        // Pure production may overflow; the ledger clamps it at sync.
        if self.inputs.is_empty() {
            return worst;
        }
        for entry in self.outputs.iter().filter(|e| !e.dump) {
            worst = entry.output_fraction(ledgers, worst);
        }
        worst
    }

    fn consume_inputs(&self, ledgers: &mut Ledgers, io: f64) {
        for entry in &self.inputs {
            match entry.pairing {
                Pairing::Plain => {
                    ledgers
                        .get_or_create(&entry.resource)
                        .consume(entry.quantity * io, &self.broker);
                }
                Pairing::Primary(secondary) => {
                    let Some(secondary) = self.inputs.get(secondary) else {
                        continue;
                    };
                    let mut need = entry.quantity * io + secondary.quantity * io;
                    let primary = ledgers.get_or_create(&entry.resource);
                    let available = primary.available().max(0.0);
                    if available >= need {
                        primary.consume(need, &self.broker);
                    } else {
                        need -= available;
                        primary.consume(available, &self.broker);
                        ledgers
                            .get_or_create(&secondary.resource)
                            .consume(need, &self.broker);
                    }
                }
                Pairing::Secondary => {}
            }
        }
    }

    fn apply_cures(&self, crew: &mut dyn CrewAccumulators, io: f64) {
        for cure in &self.cures {
            let mut accumulators = crew.accumulators(&cure.rule);
            let Some(count) = u32::try_from(accumulators.len())
                .ok()
                .filter(|count| *count > 0)
            else {
                continue;
            };
            let share = cure.quantity * io / f64::from(count);
            for value in &mut accumulators {
                **value = (**value - share).max(0.0);
            }
        }
    }
}

/// Execute a batch of recipes until a full pass makes no progress.
///
/// Returns the number of passes run.
pub fn execute_recipes(
    batch: &mut [Recipe],
    ledgers: &mut Ledgers,
    mut crew: Option<&mut (dyn CrewAccumulators + '_)>,
) -> usize {
    let mut passes: usize = 0;
    loop {
        passes = passes.saturating_add(1);
        let mut progress = false;
        for recipe in batch.iter_mut().filter(|r| !r.is_finished()) {
            progress |= recipe.execute_step(ledgers, crew.as_deref_mut());
        }
        if !progress {
            return passes;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use flowsync_types::{BrokerCategory, Fidelity};

    use super::*;
    use crate::{BrokerRegistry, ContainerRef, SyncContext};

    struct Tank {
        amount: f64,
        max: f64,
    }

    impl ContainerRef for Tank {
        fn amount(&self) -> f64 {
            self.amount
        }
        fn set_amount(&mut self, amount: f64) {
            self.amount = amount;
        }
        fn max_amount(&self) -> f64 {
            self.max
        }
        fn set_max_amount(&mut self, max_amount: f64) {
            self.max = max_amount;
        }
    }

    struct Crew {
        stress: Vec<f64>,
    }

    impl CrewAccumulators for Crew {
        fn accumulators(&mut self, rule: &str) -> Vec<&mut f64> {
            if rule == "stress" {
                self.stress.iter_mut().collect()
            } else {
                Vec::new()
            }
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Seed ledgers with fixed amount/capacity through a real sync.
    fn ledgers_with(tanks: &mut BTreeMap<&'static str, Tank>) -> Ledgers {
        let registry = BrokerRegistry::new();
        let ctx = SyncContext::new(1.0, registry.unsupported());
        let mut ledgers = Ledgers::new();
        for (name, tank) in tanks.iter_mut() {
            let ledger = ledgers.get_or_create(name);
            ledger.begin_rebuild();
            ledger.register_container(0, &*tank, 1);
            let mut containers: Vec<&mut dyn ContainerRef> = vec![tank];
            ledger.sync(&mut containers, Fidelity::Full, &ctx);
        }
        ledgers
    }

    fn broker() -> Broker {
        let mut registry = BrokerRegistry::new();
        registry.get_or_create("converter", BrokerCategory::Converter, "Converter")
    }

    #[test]
    fn rejects_non_positive_quantities() {
        let mut recipe = Recipe::new(broker());
        assert!(recipe.add_input("Ore", 0.0).is_err());
        assert!(recipe.add_output("Metal", -1.0, false).is_err());
        assert!(recipe.add_cure("stress", f64::NAN).is_err());
        assert!(recipe.add_combined_input("A", 1.0, "A", 1.0).is_err());
        assert!(recipe.add_combined_input("A", 1.0, "B", 0.0).is_err());
        assert!(recipe.inputs.is_empty());
        assert!(recipe.outputs.is_empty());
    }

    #[test]
    fn scales_to_scarcest_constraint() {
        let mut tanks = BTreeMap::from([
            ("Ore", Tank { amount: 10.0, max: 10.0 }),
            ("Metal", Tank { amount: 7.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_input("Ore", 2.0).unwrap();
        recipe.add_output("Metal", 1.0, false).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));

        assert!(close(recipe.left(), 0.0));
        assert!(ledgers.get("Ore").is_some_and(|l| close(l.deferred(), -2.0)));
        assert!(ledgers.get("Metal").is_some_and(|l| close(l.deferred(), 1.0)));
    }

    #[test]
    fn output_headroom_limits_io() {
        let mut tanks = BTreeMap::from([
            ("Ore", Tank { amount: 10.0, max: 10.0 }),
            ("Metal", Tank { amount: 9.5, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_input("Ore", 2.0).unwrap();
        recipe.add_output("Metal", 1.0, false).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));
        assert!(close(recipe.left(), 0.5));
        assert!(ledgers.get("Ore").is_some_and(|l| close(l.deferred(), -1.0)));

        // Nothing more fits.
        assert!(!recipe.execute_step(&mut ledgers, None));
    }

    #[test]
    fn dumping_output_does_not_limit() {
        let mut tanks = BTreeMap::from([
            ("Water", Tank { amount: 10.0, max: 10.0 }),
            ("Oxygen", Tank { amount: 0.0, max: 10.0 }),
            ("Hydrogen", Tank { amount: 10.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_input("Water", 1.0).unwrap();
        recipe.add_output("Oxygen", 0.5, false).unwrap();
        recipe.add_output("Hydrogen", 1.0, true).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));
        assert!(close(recipe.left(), 0.0));
    }

    #[test]
    fn combined_input_redirects_to_secondary() {
        let mut tanks = BTreeMap::from([
            ("Primary", Tank { amount: 0.0, max: 10.0 }),
            ("Secondary", Tank { amount: 10.0, max: 10.0 }),
            ("Out", Tank { amount: 0.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_combined_input("Primary", 1.0, "Secondary", 1.0).unwrap();
        recipe.add_output("Out", 1.0, false).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));

        assert!(close(recipe.left(), 0.0));
        assert!(ledgers.get("Primary").is_some_and(|l| close(l.deferred(), 0.0)));
        assert!(ledgers.get("Secondary").is_some_and(|l| close(l.deferred(), -2.0)));
    }

    #[test]
    fn combined_input_charges_primary_then_secondary_for_both_halves() {
        // Regression pin: the primary is charged both halves, the shortfall
        // (not just the secondary half) goes to the secondary.
        let mut tanks = BTreeMap::from([
            ("Primary", Tank { amount: 0.5, max: 10.0 }),
            ("Secondary", Tank { amount: 10.0, max: 10.0 }),
            ("Out", Tank { amount: 0.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_combined_input("Primary", 1.0, "Secondary", 1.0).unwrap();
        recipe.add_output("Out", 1.0, false).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));

        // Primary availability 0.5 bounds the first step.
        assert!(close(recipe.left(), 0.5));
        assert!(ledgers.get("Primary").is_some_and(|l| close(l.deferred(), -0.5)));
        assert!(ledgers.get("Secondary").is_some_and(|l| close(l.deferred(), -0.5)));

        // The primary is now empty, so the rest is metered on the secondary.
        assert!(recipe.execute_step(&mut ledgers, None));
        assert!(close(recipe.left(), 0.0));
        assert!(ledgers.get("Secondary").is_some_and(|l| close(l.deferred(), -1.5)));
    }

    #[test]
    fn pure_consumption_is_not_bounded_by_availability() {
        let mut tanks = BTreeMap::from([("Food", Tank { amount: 0.5, max: 10.0 })]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_input("Food", 2.0).unwrap();

        assert!(recipe.execute_step(&mut ledgers, None));
        assert!(close(recipe.left(), 0.0));
        assert!(ledgers.get("Food").is_some_and(|l| close(l.deferred(), -2.0)));
    }

    #[test]
    fn cures_split_across_crew_and_floor_at_zero() {
        let mut tanks = BTreeMap::from([("Food", Tank { amount: 10.0, max: 10.0 })]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut crew = Crew {
            stress: vec![5.0, 0.5],
        };
        let mut recipe = Recipe::new(broker());
        recipe.add_input("Food", 1.0).unwrap();
        recipe.add_cure("stress", 2.0).unwrap();
        recipe.add_cure("radiation", 2.0).unwrap();

        assert!(recipe.execute_step(&mut ledgers, Some(&mut crew)));
        assert!(crew.stress.first().is_some_and(|v| close(*v, 4.0)));
        assert!(crew.stress.get(1).is_some_and(|v| close(*v, 0.0)));
    }

    #[test]
    fn chained_recipes_converge_in_one_call() {
        let mut tanks = BTreeMap::from([
            ("X", Tank { amount: 5.0, max: 10.0 }),
            ("Y", Tank { amount: 0.0, max: 10.0 }),
            ("Z", Tank { amount: 0.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);

        let mut b = Recipe::new(broker());
        b.add_input("Y", 5.0).unwrap();
        b.add_output("Z", 5.0, false).unwrap();
        let mut a = Recipe::new(broker());
        a.add_input("X", 5.0).unwrap();
        a.add_output("Y", 5.0, false).unwrap();

        // Queued consumer-first: B cannot run until A has.
        let mut batch = vec![b, a];
        let passes = execute_recipes(&mut batch, &mut ledgers, None);

        assert!(passes >= 2);
        assert!(batch.iter().all(Recipe::is_finished));
        assert!(ledgers.get("Z").is_some_and(|l| close(l.deferred(), 5.0)));
        assert!(ledgers.get("Y").is_some_and(|l| close(l.deferred(), 0.0)));
        assert!(ledgers.get("X").is_some_and(|l| close(l.deferred(), -5.0)));
    }

    #[test]
    fn stalled_batch_terminates() {
        let mut tanks = BTreeMap::from([
            ("X", Tank { amount: 0.0, max: 10.0 }),
            ("Y", Tank { amount: 0.0, max: 10.0 }),
        ]);
        let mut ledgers = ledgers_with(&mut tanks);
        let mut recipe = Recipe::new(broker());
        recipe.add_input("X", 1.0).unwrap();
        recipe.add_output("Y", 1.0, false).unwrap();
        let mut batch = vec![recipe];

        assert_eq!(execute_recipes(&mut batch, &mut ledgers, None), 1);
        assert!(batch.first().is_some_and(|r| close(r.left(), 1.0)));
    }
}
