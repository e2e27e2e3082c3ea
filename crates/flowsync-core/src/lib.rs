//! Simulation clock, configuration, and tick driver for the Flowsync engine.
//!
//! This crate owns the tick cycle that drives every vessel's resources:
//! Clock, Update, Sync, Verify, and Guard.
//!
//! # Modules
//!
//! - [`clock`] -- Simulation clock with tick counter, time acceleration,
//!   throttling, and the blending window.
//! - [`config`] -- Configuration loading from `flowsync-config.yaml` into
//!   strongly-typed structs.
//! - [`updater`] -- [`ResourceUpdater`] trait for per-vessel producers and
//!   consumers.
//! - [`tick`] -- The per-tick engine loop.
//! - [`runner`] -- The bounded simulation loop.
//!
//! [`ResourceUpdater`]: updater::ResourceUpdater

pub mod clock;
pub mod config;
pub mod runner;
pub mod tick;
pub mod updater;
