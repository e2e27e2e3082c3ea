//! Vessels, parts, and crew that own the containers tracked by the Flowsync
//! engine.
//!
//! The engine in `flowsync-ledger` only knows the [`ContainerRef`] and
//! [`ResourceHost`] capabilities. This crate provides the concrete owners:
//!
//! - [`part`] -- Live parts whose [`LiveTank`]s are mutated in place.
//! - [`snapshot`] -- Serialized parts whose amounts live in JSON nodes.
//! - [`crew`] -- Crew members with named rule accumulators.
//! - [`vessel`] -- [`Vessel`], which exposes whichever representation is
//!   active and reports its simulation fidelity.
//! - [`error`] -- Error types for building and converting parts.
//!
//! [`ContainerRef`]: flowsync_ledger::ContainerRef
//! [`ResourceHost`]: flowsync_ledger::ResourceHost

pub mod crew;
pub mod error;
pub mod part;
pub mod snapshot;
pub mod vessel;

pub use crew::{Crew, CrewMember};
pub use error::WorldError;
pub use part::{LiveTank, Part, PartResource};
pub use snapshot::{ProtoPart, ProtoResource, SnapshotTank};
pub use vessel::Vessel;
