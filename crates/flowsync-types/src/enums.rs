//! Enumeration types shared across the Flowsync workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Broker categories
// ---------------------------------------------------------------------------

/// The kind of producer or consumer a broker stands for.
///
/// Purely a bookkeeping tag for UI grouping and diagnostics; the engine
/// never branches on it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BrokerCategory {
    /// Anything that does not fit another category, including changes made
    /// outside the engine.
    #[default]
    Unknown,
    /// Generic producer (reactor, generator).
    Generator,
    /// Converts one set of resources into another.
    Converter,
    /// Extracts resources from the environment.
    Harvester,
    /// Photovoltaic panel.
    SolarPanel,
    /// Radioisotope thermoelectric generator.
    Rtg,
    /// Fuel cell.
    FuelCell,
    /// Environment control and life support machinery.
    Eclss,
    /// Always-on vessel systems (avionics, heaters).
    VesselSystem,
    /// Crew metabolism.
    Crew,
    /// Antennas and data transmission.
    Comms,
    /// Science processing.
    Science,
    /// Running experiments.
    Experiment,
    /// Habitat pressurization and maintenance.
    Habitat,
    /// Propulsion.
    Engine,
}

impl BrokerCategory {
    /// Short human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Generator => "generator",
            Self::Converter => "converter",
            Self::Harvester => "harvester",
            Self::SolarPanel => "solar panel",
            Self::Rtg => "rtg",
            Self::FuelCell => "fuel cell",
            Self::Eclss => "eclss",
            Self::VesselSystem => "vessel system",
            Self::Crew => "crew",
            Self::Comms => "comms",
            Self::Science => "science",
            Self::Experiment => "experiment",
            Self::Habitat => "habitat",
            Self::Engine => "engine",
        }
    }
}

impl core::fmt::Display for BrokerCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Simulation fidelity
// ---------------------------------------------------------------------------

/// How a vessel is being simulated this tick.
///
/// Only [`Fidelity::Full`] vessels are subject to the coherency guard: a
/// vessel simulated from persisted state has no live writers that could
/// bypass the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Actively simulated, containers are live objects.
    #[default]
    Full,
    /// Background approximation from a serialized snapshot.
    Background,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&BrokerCategory::SolarPanel).unwrap();
        assert_eq!(json, "\"solar_panel\"");
    }

    #[test]
    fn category_default_is_unknown() {
        assert_eq!(BrokerCategory::default(), BrokerCategory::Unknown);
        assert_eq!(BrokerCategory::Unknown.to_string(), "unknown");
    }
}
