//! Read-only snapshots of a resource ledger.
//!
//! These are what monitoring, UI, and other gameplay rules consume after a
//! sync. They own their data so they can outlive the registry borrow and be
//! serialized as-is.

use serde::{Deserialize, Serialize};

use crate::BrokerCategory;

/// Net contribution of one broker to a resource over the last sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerShare {
    /// Unique broker id.
    pub id: String,
    /// Broker category.
    pub category: BrokerCategory,
    /// Display title.
    pub title: String,
    /// Signed rate in units per second (positive means production).
    pub rate: f64,
    /// Whether the rate is a simulated average from an interval rule
    /// rather than a measured per-tick contribution.
    pub averaged: bool,
}

/// Read-only view of one resource ledger after the last sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerView {
    /// Resource name.
    pub resource: String,
    /// Amount stored across all containers.
    pub amount: f64,
    /// Total capacity across all containers.
    pub capacity: f64,
    /// `amount / capacity`, or 0 when there is no capacity.
    pub level: f64,
    /// Instantaneous rate, units per second.
    pub rate: f64,
    /// Rate including the simulated averages of interval rules.
    pub average_rate: f64,
    /// Seconds until empty at the average rate, `None` when not draining.
    pub depletion_time: Option<f64>,
    /// Per-broker breakdown, sorted by broker id.
    pub brokers: Vec<BrokerShare>,
}

impl LedgerView {
    /// Whether at least `quantity` is currently stored.
    pub fn has(&self, quantity: f64) -> bool {
        self.amount >= quantity
    }

    /// Whether the ledger is effectively full.
    pub fn is_full(&self) -> bool {
        self.capacity > 0.0 && self.capacity - self.amount <= 1e-9
    }
}
