//! Serialized parts of vessels that are not actively simulated.
//!
//! A [`ProtoPart`] keeps each resource as a JSON node:
//!
//! ```json
//! { "name": "Oxygen", "amount": 12.5, "maxAmount": 40.0, "flowPriority": 0, "flowState": true }
//! ```
//!
//! The engine reads and writes `amount` and `maxAmount` on the node itself,
//! so a snapshot stays the single source of truth while the vessel is
//! unloaded.

use flowsync_ledger::ContainerRef;
use serde_json::{Map, Value};

use crate::error::{WorldError, check_amount};
use crate::part::{LiveTank, Part, PartResource};

const AMOUNT: &str = "amount";
const MAX_AMOUNT: &str = "maxAmount";
const NAME: &str = "name";
const PRIORITY: &str = "flowPriority";
const FLOW_STATE: &str = "flowState";

/// A container backed by a serialized resource node.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotTank {
    node: Map<String, Value>,
}

impl SnapshotTank {
    fn number(&self, key: &str) -> f64 {
        self.node.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// The underlying node.
    pub const fn node(&self) -> &Map<String, Value> {
        &self.node
    }
}

impl ContainerRef for SnapshotTank {
    fn amount(&self) -> f64 {
        self.number(AMOUNT)
    }

    fn set_amount(&mut self, amount: f64) {
        self.node.insert(AMOUNT.to_owned(), Value::from(amount));
    }

    fn max_amount(&self) -> f64 {
        self.number(MAX_AMOUNT)
    }

    fn set_max_amount(&mut self, max_amount: f64) {
        self.node.insert(MAX_AMOUNT.to_owned(), Value::from(max_amount));
    }
}

/// One serialized resource of a [`ProtoPart`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoResource {
    /// Resource name.
    pub name: String,
    /// Flow priority.
    pub priority: i32,
    /// Locked resources are invisible to the engine.
    pub flow_enabled: bool,
    /// Serialized storage.
    pub tank: SnapshotTank,
}

impl ProtoResource {
    /// Parse one resource node.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingField`] when `name`, `amount` or
    /// `maxAmount` is absent, [`WorldError::MalformedField`] when one of them
    /// has the wrong type, and [`WorldError::InvalidAmount`] when the amounts
    /// are out of range.
    pub fn from_json(value: &Value) -> Result<Self, WorldError> {
        let node = value.as_object().ok_or_else(|| WorldError::MalformedField {
            field: "resources",
            reason: "entry is not an object".to_owned(),
        })?;

        let name = node
            .get(NAME)
            .ok_or(WorldError::MissingField { field: NAME })?
            .as_str()
            .ok_or_else(|| WorldError::MalformedField {
                field: NAME,
                reason: "expected a string".to_owned(),
            })?
            .to_owned();
        let amount = required_number(node, AMOUNT)?;
        let max_amount = required_number(node, MAX_AMOUNT)?;
        check_amount(&name, amount, max_amount)?;

        let priority = match node.get(PRIORITY) {
            None => 0,
            Some(v) => v
                .as_i64()
                .and_then(|p| i32::try_from(p).ok())
                .ok_or_else(|| WorldError::MalformedField {
                    field: PRIORITY,
                    reason: format!("expected a 32-bit integer, got {v}"),
                })?,
        };
        let flow_enabled = node.get(FLOW_STATE).and_then(Value::as_bool).unwrap_or(true);

        Ok(Self {
            name,
            priority,
            flow_enabled,
            tank: SnapshotTank { node: node.clone() },
        })
    }

    /// Serialize a live resource into a node.
    pub fn from_live(resource: &PartResource) -> Self {
        let mut node = Map::new();
        node.insert(NAME.to_owned(), Value::from(resource.name.as_str()));
        node.insert(AMOUNT.to_owned(), Value::from(resource.tank.amount()));
        node.insert(MAX_AMOUNT.to_owned(), Value::from(resource.tank.max_amount()));
        node.insert(PRIORITY.to_owned(), Value::from(resource.priority));
        node.insert(FLOW_STATE.to_owned(), Value::from(resource.flow_enabled));
        Self {
            name: resource.name.clone(),
            priority: resource.priority,
            flow_enabled: resource.flow_enabled,
            tank: SnapshotTank { node },
        }
    }

    /// Rebuild the live resource.
    pub fn to_live(&self) -> PartResource {
        PartResource {
            name: self.name.clone(),
            priority: self.priority,
            flow_enabled: self.flow_enabled,
            tank: LiveTank::new(self.tank.amount(), self.tank.max_amount()),
        }
    }
}

fn required_number(node: &Map<String, Value>, field: &'static str) -> Result<f64, WorldError> {
    node.get(field)
        .ok_or(WorldError::MissingField { field })?
        .as_f64()
        .ok_or_else(|| WorldError::MalformedField {
            field,
            reason: "expected a number".to_owned(),
        })
}

/// A serialized vessel part.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoPart {
    /// Display title.
    pub title: String,
    /// Serialized resources.
    pub resources: Vec<ProtoResource>,
}

impl ProtoPart {
    /// Parse a part of the form `{ "title": .., "resources": [ .. ] }`.
    ///
    /// # Errors
    ///
    /// Returns a [`WorldError`] describing the first malformed field.
    pub fn from_json(value: &Value) -> Result<Self, WorldError> {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .ok_or(WorldError::MissingField { field: "title" })?
            .to_owned();
        let resources = match value.get("resources") {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(ProtoResource::from_json)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(WorldError::MalformedField {
                    field: "resources",
                    reason: "expected an array".to_owned(),
                });
            }
        };
        Ok(Self { title, resources })
    }

    /// Serialize back into a JSON value.
    pub fn to_json(&self) -> Value {
        let resources = self
            .resources
            .iter()
            .map(|r| Value::Object(r.tank.node.clone()))
            .collect();
        let mut part = Map::new();
        part.insert("title".to_owned(), Value::from(self.title.as_str()));
        part.insert("resources".to_owned(), Value::Array(resources));
        Value::Object(part)
    }

    /// Serialize a live part.
    pub fn from_live(part: &Part) -> Self {
        Self {
            title: part.title.clone(),
            resources: part.resources.iter().map(ProtoResource::from_live).collect(),
        }
    }

    /// Rebuild the live part.
    pub fn to_live(&self) -> Part {
        Part {
            title: self.title.clone(),
            resources: self.resources.iter().map(ProtoResource::to_live).collect(),
        }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "title": "Greenhouse",
            "resources": [
                { "name": "Water", "amount": 12.5, "maxAmount": 40.0, "flowPriority": 3 },
                { "name": "Food", "amount": 1.0, "maxAmount": 2.0, "flowState": false, "color": "green" }
            ]
        })
    }

    #[test]
    fn parses_nodes_with_defaults() {
        let part = ProtoPart::from_json(&sample()).unwrap();

        assert_eq!(part.title, "Greenhouse");
        let water = part.resources.first();
        assert!(water.is_some_and(|w| w.priority == 3 && w.flow_enabled));
        let food = part.resources.get(1);
        assert!(food.is_some_and(|f| f.priority == 0 && !f.flow_enabled));
    }

    #[test]
    fn writes_go_to_the_node_and_keep_unknown_keys() {
        let mut part = ProtoPart::from_json(&sample()).unwrap();
        if let Some(food) = part.resources.get_mut(1) {
            food.tank.set_amount(0.25);
        }

        let out = part.to_json();
        assert_eq!(out["resources"][1]["amount"], json!(0.25));
        assert_eq!(out["resources"][1]["color"], json!("green"));
    }

    #[test]
    fn missing_and_malformed_fields() {
        let no_amount = json!({ "title": "T", "resources": [ { "name": "Water", "maxAmount": 1.0 } ] });
        assert_eq!(
            ProtoPart::from_json(&no_amount),
            Err(WorldError::MissingField { field: "amount" })
        );

        let bad_priority = json!({ "title": "T", "resources": [
            { "name": "Water", "amount": 0.0, "maxAmount": 1.0, "flowPriority": "high" }
        ] });
        assert!(matches!(
            ProtoPart::from_json(&bad_priority),
            Err(WorldError::MalformedField { field: "flowPriority", .. })
        ));

        let overfull = json!({ "title": "T", "resources": [
            { "name": "Water", "amount": 2.0, "maxAmount": 1.0 }
        ] });
        assert!(matches!(
            ProtoPart::from_json(&overfull),
            Err(WorldError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn live_conversion_preserves_amounts() {
        let live = Part::new("Tank").with_resource("Fuel", 3.0, 9.0, 4).unwrap();
        let proto = ProtoPart::from_live(&live);

        assert!((proto.amount_of("Fuel") - 3.0).abs() < 1e-12);
        assert_eq!(proto.to_live(), live);
    }
}
