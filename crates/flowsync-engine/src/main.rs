//! Demo driver for the Flowsync engine.
//!
//! This is the main entry point that wires together configuration, the
//! seeded demo fleet, and the tick loop, then prints every vessel's ledger
//! views as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `flowsync-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulation state (clock, brokers, cache)
//! 4. Spawn the demo fleet and its updaters
//! 5. Run the simulation loop
//! 6. Log the result and print the final ledger views

mod error;
mod spawner;
mod updaters;

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use flowsync_core::config::SimulationConfig;
use flowsync_core::runner::{self, TickCallback};
use flowsync_core::tick::{SimulationState, TickSummary};
use flowsync_types::{LedgerView, VesselId};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "flowsync-config.yaml";

/// Ticks between progress log lines.
const PROGRESS_EVERY: u64 = 100;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        vessels = config.world.vessels,
        tick_seconds = config.time.tick_seconds,
        acceleration = config.time.acceleration,
        max_ticks = config.time.max_ticks,
        "Configuration loaded"
    );

    // 3. Create the simulation state.
    let mut state = SimulationState::new(&config)
        .map_err(EngineError::from)
        .context("initializing simulation clock")?;

    // 4. Spawn the demo fleet.
    let fleet = spawner::spawn_fleet(&config.world, &mut state).context("spawning demo fleet")?;

    // 5. Run the simulation.
    let mut callback = ProgressCallback {
        every: PROGRESS_EVERY,
    };
    let result = runner::run_simulation(&mut state, config.time.max_ticks, &mut callback)
        .map_err(EngineError::from)
        .context("running simulation")?;

    // 6. Log results and print the final views.
    runner::log_simulation_end(&result);

    let report = fleet_report(&state, &fleet.vessels);
    let json = serde_json::to_string_pretty(&report)
        .map_err(EngineError::from)
        .context("serializing final report")?;
    println!("{json}");

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "flowsync-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration, falling back to defaults when the
/// file does not exist.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        let mut config = SimulationConfig::default();
        config
            .logging
            .apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Logs fleet totals every `every` ticks.
struct ProgressCallback {
    every: u64,
}

impl TickCallback for ProgressCallback {
    fn on_tick(&mut self, summary: &TickSummary, state: &mut SimulationState) -> ControlFlow<()> {
        if summary.tick.checked_rem(self.every) == Some(0) {
            let charge: f64 = state
                .cache
                .iter()
                .filter_map(|(_, r)| r.get(updaters::ELECTRIC_CHARGE))
                .map(flowsync_ledger::ResourceLedger::amount)
                .sum();
            info!(
                tick = summary.tick,
                acceleration = summary.acceleration,
                fleet_charge = charge,
                "Progress"
            );
        }
        ControlFlow::Continue(())
    }
}

/// Final state of one vessel.
#[derive(Debug, Serialize)]
struct VesselReport {
    id: VesselId,
    name: String,
    loaded: bool,
    crew: usize,
    resources: Vec<LedgerView>,
}

fn fleet_report(state: &SimulationState, order: &[VesselId]) -> Vec<VesselReport> {
    order
        .iter()
        .filter_map(|id| {
            let vessel = state.vessels.get(id)?;
            Some(VesselReport {
                id: *id,
                name: vessel.name.clone(),
                loaded: vessel.is_loaded(),
                crew: vessel.crew.len(),
                resources: state.resources(*id).map(|r| r.views()).unwrap_or_default(),
            })
        })
        .collect()
}
