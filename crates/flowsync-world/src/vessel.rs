//! Vessels: the aggregate that owns parts, snapshots, and crew.
//!
//! A loaded vessel is simulated at full fidelity and exposes its live
//! [`Part`]s. An unloaded vessel exposes its serialized [`ProtoPart`]s and
//! is simulated in the background. [`Vessel::unload`] and [`Vessel::load`]
//! convert between the two so exactly one representation is active.

use flowsync_ledger::{ContainerSlot, CrewAccumulators, ResourceHost};
use flowsync_types::{Fidelity, VesselId};
use tracing::debug;

use crate::crew::Crew;
use crate::error::WorldError;
use crate::part::Part;
use crate::snapshot::ProtoPart;

/// A simulated craft.
#[derive(Debug, Clone)]
pub struct Vessel {
    /// Identity.
    pub id: VesselId,
    /// Display name.
    pub name: String,
    /// Live parts, populated while loaded.
    pub parts: Vec<Part>,
    /// Serialized parts, populated while unloaded.
    pub proto_parts: Vec<ProtoPart>,
    /// Crew aboard.
    pub crew: Crew,
    loaded: bool,
}

impl Vessel {
    /// Create a loaded vessel with no parts.
    pub fn new(name: &str) -> Self {
        Self {
            id: VesselId::new(),
            name: name.to_owned(),
            parts: Vec::new(),
            proto_parts: Vec::new(),
            crew: Crew::default(),
            loaded: true,
        }
    }

    /// Create an unloaded vessel from serialized parts.
    pub fn from_snapshot(name: &str, proto_parts: Vec<ProtoPart>) -> Self {
        Self {
            id: VesselId::new(),
            name: name.to_owned(),
            parts: Vec::new(),
            proto_parts,
            crew: Crew::default(),
            loaded: false,
        }
    }

    /// Whether live parts are active.
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Attach a live part. Unloaded vessels serialize it immediately.
    pub fn attach(&mut self, part: Part) {
        if self.loaded {
            self.parts.push(part);
        } else {
            self.proto_parts.push(ProtoPart::from_live(&part));
        }
    }

    /// Remove the part at `index` of the active representation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PartNotFound`] if `index` is out of range.
    pub fn detach(&mut self, index: usize) -> Result<(), WorldError> {
        let count = self.part_count();
        if index >= count {
            return Err(WorldError::PartNotFound { index, count });
        }
        if self.loaded {
            self.parts.remove(index);
        } else {
            self.proto_parts.remove(index);
        }
        Ok(())
    }

    /// Number of parts in the active representation.
    pub fn part_count(&self) -> usize {
        if self.loaded {
            self.parts.len()
        } else {
            self.proto_parts.len()
        }
    }

    /// Serialize live parts and switch to background simulation.
    pub fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.proto_parts = self.parts.drain(..).map(|p| ProtoPart::from_live(&p)).collect();
        self.loaded = false;
        debug!(vessel = %self.id, parts = self.proto_parts.len(), "Vessel unloaded");
    }

    /// Rebuild live parts and switch to full simulation.
    pub fn load(&mut self) {
        if self.loaded {
            return;
        }
        self.parts = self.proto_parts.drain(..).map(|p| p.to_live()).collect();
        self.loaded = true;
        debug!(vessel = %self.id, parts = self.parts.len(), "Vessel loaded");
    }

    /// Total stored amount of `resource` across the active representation.
    pub fn amount_of(&self, resource: &str) -> f64 {
        if self.loaded {
            self.parts.iter().map(|p| p.amount_of(resource)).sum()
        } else {
            self.proto_parts.iter().map(|p| p.amount_of(resource)).sum()
        }
    }
}

impl ResourceHost for Vessel {
    fn fidelity(&self) -> Fidelity {
        if self.loaded {
            Fidelity::Full
        } else {
            Fidelity::Background
        }
    }

    fn containers(&mut self) -> Vec<ContainerSlot<'_>> {
        if self.loaded {
            self.parts
                .iter_mut()
                .flat_map(|p| p.resources.iter_mut())
                .filter(|r| r.flow_enabled)
                .map(|r| ContainerSlot::new(&r.name, r.priority, &mut r.tank))
                .collect()
        } else {
            self.proto_parts
                .iter_mut()
                .flat_map(|p| p.resources.iter_mut())
                .filter(|r| r.flow_enabled)
                .map(|r| ContainerSlot::new(&r.name, r.priority, &mut r.tank))
                .collect()
        }
    }

    fn crew(&mut self) -> Option<&mut dyn CrewAccumulators> {
        if self.crew.is_empty() {
            None
        } else {
            Some(&mut self.crew)
        }
    }
}
