//! Live parts: containers held in memory and mutated in place.
//!
//! A [`Part`] of an actively simulated vessel owns one [`PartResource`] per
//! resource it stores. The engine writes straight into the [`LiveTank`].

use flowsync_ledger::ContainerRef;
use serde::{Deserialize, Serialize};

use crate::error::{WorldError, check_amount};

/// Directly mutable storage of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveTank {
    amount: f64,
    max_amount: f64,
}

impl LiveTank {
    /// Create a tank holding `amount` out of `max_amount`.
    pub const fn new(amount: f64, max_amount: f64) -> Self {
        Self { amount, max_amount }
    }
}

impl ContainerRef for LiveTank {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn set_amount(&mut self, amount: f64) {
        self.amount = amount;
    }

    fn max_amount(&self) -> f64 {
        self.max_amount
    }

    fn set_max_amount(&mut self, max_amount: f64) {
        self.max_amount = max_amount;
    }
}

/// One resource stored by a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartResource {
    /// Resource name.
    pub name: String,
    /// Flow priority; higher tiers are drained first and filled last.
    pub priority: i32,
    /// Locked resources are invisible to the engine.
    pub flow_enabled: bool,
    /// The storage itself.
    pub tank: LiveTank,
}

/// A live vessel part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Display title.
    pub title: String,
    /// Stored resources.
    pub resources: Vec<PartResource>,
}

impl Part {
    /// Create a part with no resources.
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            resources: Vec::new(),
        }
    }

    /// Add a resource container.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidAmount`] if `amount` is negative, above
    /// `max_amount`, or not finite.
    pub fn with_resource(
        mut self,
        name: &str,
        amount: f64,
        max_amount: f64,
        priority: i32,
    ) -> Result<Self, WorldError> {
        check_amount(name, amount, max_amount)?;
        self.resources.push(PartResource {
            name: name.to_owned(),
            priority,
            flow_enabled: true,
            tank: LiveTank::new(amount, max_amount),
        });
        Ok(self)
    }

    /// First container of `name`.
    pub fn resource(&self, name: &str) -> Option<&PartResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// First container of `name`, mutably.
    pub fn resource_mut(&mut self, name: &str) -> Option<&mut PartResource> {
        self.resources.iter_mut().find(|r| r.name == name)
    }

    /// Total stored amount of `name`.
    pub fn amount_of(&self, name: &str) -> f64 {
        self.resources
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.tank.amount())
            .sum()
    }
}
