//! Resource registry of one vessel and its per-tick sync sequence.

use std::collections::BTreeMap;

use flowsync_types::{LedgerView, ResourceId};
use tracing::debug;

use crate::{
    Broker, CoherencyNotice, ContainerRef, DEFAULT_PRIORITY, Ledgers, Recipe, ResourceHost,
    ResourceLedger, SyncContext, execute_recipes,
};

/// Outcome of one vessel sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselSyncReport {
    /// Recipes that were queued this tick.
    pub recipes_executed: usize,
    /// Passes the recipe solver needed to reach a fixed point.
    pub recipe_passes: usize,
    /// Containers enumerated from the vessel.
    pub containers: usize,
    /// Ledgers synchronized.
    pub ledgers: usize,
    /// Coherency notices raised by the ledgers.
    pub notices: Vec<CoherencyNotice>,
}

/// All resource ledgers of one vessel plus the recipes queued this tick.
#[derive(Debug, Default)]
pub struct VesselResources {
    ledgers: Ledgers,
    recipes: Vec<Recipe>,
}

impl VesselResources {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            ledgers: Ledgers::new(),
            recipes: Vec::new(),
        }
    }

    /// Ledger for `resource`, created on first reference.
    pub fn ledger(&mut self, resource: &str) -> &mut ResourceLedger {
        self.ledgers.get_or_create(resource)
    }

    /// Existing ledger for `resource`.
    pub fn get(&self, resource: &str) -> Option<&ResourceLedger> {
        self.ledgers.get(resource)
    }

    /// Existing ledger by id.
    pub fn get_by_id(&self, id: ResourceId) -> Option<&ResourceLedger> {
        self.ledgers.get_by_id(id)
    }

    /// Record an intent to add `quantity` of `resource`.
    pub fn produce(&mut self, resource: &str, quantity: f64, broker: &Broker) {
        self.ledgers.get_or_create(resource).produce(quantity, broker);
    }

    /// Record an intent to remove `quantity` of `resource`.
    pub fn consume(&mut self, resource: &str, quantity: f64, broker: &Broker) {
        self.ledgers.get_or_create(resource).consume(quantity, broker);
    }

    /// Queue a recipe for execution at the next sync.
    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    /// Recipes queued since the last sync.
    pub fn pending_recipes(&self) -> usize {
        self.recipes.len()
    }

    /// Read-only view of one resource.
    pub fn ledger_view(&self, resource: &str) -> Option<LedgerView> {
        self.ledgers.get(resource).map(ResourceLedger::view)
    }

    /// Read-only views of every known resource, in resource id order.
    pub fn views(&self) -> Vec<LedgerView> {
        self.ledgers.iter().map(ResourceLedger::view).collect()
    }

    /// All ledgers.
    pub const fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    /// Reconcile everything recorded this tick against the vessel.
    ///
    /// Runs the queued recipes to a fixed point, rebuilds every tank pool
    /// from the containers the host enumerates, then syncs every ledger.
    pub fn sync(&mut self, host: &mut dyn ResourceHost, ctx: &SyncContext<'_>) -> VesselSyncReport {
        let fidelity = host.fidelity();

        let recipes_executed = self.recipes.len();
        let recipe_passes = if self.recipes.is_empty() {
            0
        } else {
            execute_recipes(&mut self.recipes, &mut self.ledgers, host.crew())
        };
        self.recipes.clear();

        self.ledgers.begin_rebuild();
        let mut grouped: BTreeMap<ResourceId, Vec<&mut dyn ContainerRef>> = BTreeMap::new();
        let mut containers: usize = 0;
        for slot in host.containers() {
            let priority = if ctx.priority_flow {
                slot.priority
            } else {
                DEFAULT_PRIORITY
            };
            let ledger = self.ledgers.get_or_create(slot.resource);
            let members = grouped.entry(ledger.id()).or_default();
            ledger.register_container(members.len(), &*slot.container, priority);
            members.push(slot.container);
            containers = containers.saturating_add(1);
        }

        let mut notices = Vec::new();
        for (id, ledger) in self.ledgers.iter_mut() {
            let mut members = grouped.remove(id).unwrap_or_default();
            if let Some(notice) = ledger.sync(&mut members, fidelity, ctx) {
                notices.push(notice);
            }
        }

        debug!(
            recipes_executed,
            recipe_passes,
            containers,
            ledgers = self.ledgers.len(),
            notices = notices.len(),
            "Vessel resources synced"
        );

        VesselSyncReport {
            recipes_executed,
            recipe_passes,
            containers,
            ledgers: self.ledgers.len(),
            notices,
        }
    }
}
