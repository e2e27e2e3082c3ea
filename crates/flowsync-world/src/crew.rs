//! Crew members and their per-rule accumulators.
//!
//! Each member tracks named accumulators ("co2_poisoning", "stress", ...)
//! that rules raise over time and that recipe cures lower.

use std::collections::BTreeMap;

use flowsync_ledger::CrewAccumulators;
use serde::{Deserialize, Serialize};

/// One crew member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    /// Name.
    pub name: String,
    /// Accumulator value per rule name.
    pub rules: BTreeMap<String, f64>,
}

impl CrewMember {
    /// Create a member with no accumulators.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rules: BTreeMap::new(),
        }
    }

    /// Current value of `rule`, zero if never accumulated.
    pub fn value(&self, rule: &str) -> f64 {
        self.rules.get(rule).copied().unwrap_or(0.0)
    }
}

/// The crew aboard a vessel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    /// Members in boarding order.
    pub members: Vec<CrewMember>,
}

impl Crew {
    /// Board a new member.
    pub fn board(&mut self, name: &str) {
        self.members.push(CrewMember::new(name));
    }

    /// Number of members aboard.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is aboard.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Raise `rule` by `amount` for every member.
    pub fn accumulate(&mut self, rule: &str, amount: f64) {
        for member in &mut self.members {
            *member.rules.entry(rule.to_owned()).or_insert(0.0) += amount;
        }
    }

    /// Sum of `rule` over all members.
    pub fn total(&self, rule: &str) -> f64 {
        self.members.iter().map(|m| m.value(rule)).sum()
    }
}

impl CrewAccumulators for Crew {
    fn accumulators(&mut self, rule: &str) -> Vec<&mut f64> {
        self.members
            .iter_mut()
            .filter_map(|m| m.rules.get_mut(rule))
            .collect()
    }
}
