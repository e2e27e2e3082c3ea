//! Attribution identities.
//!
//! A [`Broker`] names whoever produced or consumed a quantity: a solar
//! panel, a converter, the crew. Brokers carry no behavior; ledgers use
//! them as map keys to publish a per-source breakdown.
//!
//! Brokers are interned by the [`BrokerRegistry`], which the simulation
//! context constructs once and hands to whoever needs to create or look up
//! a broker. Equal ids always yield the same instance; equality, ordering,
//! and hashing compare the id only.

use std::collections::BTreeMap;
use std::sync::Arc;

use flowsync_types::{BrokerCategory, BrokerShare};

/// Id of the broker that absorbs changes made outside the engine.
pub const UNSUPPORTED_BROKER_ID: &str = "unsupported";

/// Id of the broker for callers that do not track attribution.
pub const GENERIC_BROKER_ID: &str = "generic";

#[derive(Debug)]
struct BrokerInfo {
    id: String,
    category: BrokerCategory,
    title: String,
}

/// An interned attribution identity.
///
/// Cloning is a reference-count bump.
#[derive(Debug, Clone)]
pub struct Broker(Arc<BrokerInfo>);

impl Broker {
    fn new(id: &str, category: BrokerCategory, title: &str) -> Self {
        Self(Arc::new(BrokerInfo {
            id: id.to_owned(),
            category,
            title: title.to_owned(),
        }))
    }

    /// Unique id.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Category tag.
    pub fn category(&self) -> BrokerCategory {
        self.0.category
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.0.title
    }

    /// Build the published share for this broker.
    pub fn share(&self, rate: f64, averaged: bool) -> BrokerShare {
        BrokerShare {
            id: self.0.id.clone(),
            category: self.0.category,
            title: self.0.title.clone(),
            rate,
            averaged,
        }
    }
}

impl PartialEq for Broker {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Broker {}

impl PartialOrd for Broker {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Broker {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl core::hash::Hash for Broker {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl core::fmt::Display for Broker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.0.title, self.0.category)
    }
}

/// Interning service for brokers.
#[derive(Debug)]
pub struct BrokerRegistry {
    brokers: BTreeMap<String, Broker>,
    unsupported: Broker,
    generic: Broker,
}

impl BrokerRegistry {
    /// Create a registry holding the predefined `unsupported` and `generic`
    /// brokers.
    pub fn new() -> Self {
        let unsupported = Broker::new(UNSUPPORTED_BROKER_ID, BrokerCategory::Unknown, "Others");
        let generic = Broker::new(GENERIC_BROKER_ID, BrokerCategory::Unknown, "Generic");
        let mut brokers = BTreeMap::new();
        brokers.insert(UNSUPPORTED_BROKER_ID.to_owned(), unsupported.clone());
        brokers.insert(GENERIC_BROKER_ID.to_owned(), generic.clone());
        Self {
            brokers,
            unsupported,
            generic,
        }
    }

    /// Return the broker for `id`, creating it on first use.
    ///
    /// Category and title are only taken from the first call for an id.
    pub fn get_or_create(&mut self, id: &str, category: BrokerCategory, title: &str) -> Broker {
        if let Some(broker) = self.brokers.get(id) {
            return broker.clone();
        }
        let broker = Broker::new(id, category, title);
        self.brokers.insert(id.to_owned(), broker.clone());
        broker
    }

    /// Look up an existing broker.
    pub fn get(&self, id: &str) -> Option<&Broker> {
        self.brokers.get(id)
    }

    /// The broker changes made outside the engine are attributed to.
    pub const fn unsupported(&self) -> &Broker {
        &self.unsupported
    }

    /// A catch-all broker.
    pub const fn generic(&self) -> &Broker {
        &self.generic
    }

    /// Number of interned brokers, predefined ones included.
    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    /// Always `false`: the predefined brokers are registered on creation.
    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }

    /// Iterate brokers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
