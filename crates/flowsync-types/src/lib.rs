//! Shared type definitions for the Flowsync resource engine.
//!
//! This crate holds the types that cross crate boundaries: identifiers,
//! the broker category tag, and the serializable views other subsystems
//! read after every sync.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe vessel identifiers and hashed resource ids
//! - [`enums`] -- Broker categories and simulation fidelity
//! - [`views`] -- Read-only ledger snapshots published after each sync

pub mod enums;
pub mod ids;
pub mod views;

// Re-export all public types at crate root for convenience.
pub use enums::{BrokerCategory, Fidelity};
pub use ids::{ResourceId, VesselId};
pub use views::{BrokerShare, LedgerView};
