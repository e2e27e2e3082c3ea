//! Simulation loop runner.
//!
//! This module provides [`run_simulation`], which drives the tick loop with
//! support for:
//!
//! - **Bounded simulation**: stop after `max_ticks`
//! - **Callback stop**: the [`TickCallback`] can end the run after any tick
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::ops::ControlFlow;

use tracing::{info, warn};

use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// The tick callback asked to stop.
    CallbackStop,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Coherency notices raised over the whole run.
    pub total_notices: usize,
    /// Conservation anomalies detected over the whole run.
    pub total_anomalies: usize,
}

/// Callback invoked after each tick completes.
///
/// Implementations can publish ledger views, change the acceleration, add
/// or remove vessels, or stop the run by returning [`ControlFlow::Break`].
pub trait TickCallback {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &mut SimulationState) -> ControlFlow<()>;
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &mut SimulationState) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Run the simulation loop until a termination condition is met.
///
/// `max_ticks` of 0 runs until the callback breaks.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub fn run_simulation(
    state: &mut SimulationState,
    max_ticks: u64,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut total_ticks: u64 = 0;
    let mut total_notices: usize = 0;
    let mut total_anomalies: usize = 0;

    info!(
        max_ticks,
        vessels = state.vessels.len(),
        updaters = state.updater_count(),
        acceleration = state.clock.acceleration(),
        "Simulation starting"
    );

    loop {
        // --- Execute tick ---
        let summary = tick::run_tick(state)?;

        total_ticks = total_ticks.saturating_add(1);
        total_notices = total_notices.saturating_add(summary.notices.len());
        total_anomalies = total_anomalies.saturating_add(summary.anomalies.len());

        // --- Notify callback ---
        let flow = callback.on_tick(&summary, state);

        let end_reason = if flow.is_break() {
            info!(tick = summary.tick, "Callback requested stop");
            Some(SimulationEndReason::CallbackStop)
        } else if max_ticks > 0 && total_ticks >= max_ticks {
            info!(tick = summary.tick, max_ticks, "Tick limit reached");
            Some(SimulationEndReason::MaxTicksReached)
        } else {
            None
        };

        if let Some(end_reason) = end_reason {
            return Ok(SimulationResult {
                end_reason,
                final_summary: Some(summary),
                total_ticks,
                total_notices,
                total_anomalies,
            });
        }
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        total_notices = result.total_notices,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if result.total_anomalies > 0 {
        warn!(
            anomalies = result.total_anomalies,
            "Conservation anomalies were detected during the run"
        );
    }

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            acceleration = summary.acceleration,
            vessels = summary.vessels,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use flowsync_world::{Part, Vessel};

    use super::*;
    use crate::config::SimulationConfig;

    fn make_simulation_state() -> SimulationState {
        let mut state = SimulationState::new(&SimulationConfig::default()).unwrap();
        let mut vessel = Vessel::new("Probe");
        vessel.attach(
            Part::new("Battery")
                .with_resource("ElectricCharge", 10.0, 20.0, 0)
                .unwrap(),
        );
        state.add_vessel(vessel);
        state
    }

    #[test]
    fn bounded_by_max_ticks() {
        let mut state = make_simulation_state();
        let mut cb = NoOpCallback;

        let result = run_simulation(&mut state, 5, &mut cb).unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(result.final_summary.map(|s| s.tick), Some(5));
    }

    #[test]
    fn callback_stop() {
        struct StopAt(u64);
        impl TickCallback for StopAt {
            fn on_tick(&mut self, summary: &TickSummary, _state: &mut SimulationState) -> ControlFlow<()> {
                if summary.tick >= self.0 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }

        let mut state = make_simulation_state();
        let result = run_simulation(&mut state, 0, &mut StopAt(3)).unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::CallbackStop);
        assert_eq!(result.total_ticks, 3);
    }

    #[test]
    fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary, _state: &mut SimulationState) -> ControlFlow<()> {
                self.count = self.count.saturating_add(1);
                ControlFlow::Continue(())
            }
        }

        let mut state = make_simulation_state();
        let mut cb = CountCallback { count: 0 };

        run_simulation(&mut state, 3, &mut cb).unwrap();

        assert_eq!(cb.count, 3);
    }

    #[test]
    fn callback_can_change_acceleration() {
        struct Warp;
        impl TickCallback for Warp {
            fn on_tick(&mut self, summary: &TickSummary, state: &mut SimulationState) -> ControlFlow<()> {
                if summary.tick == 1 {
                    state.clock.set_acceleration(50.0).unwrap();
                }
                ControlFlow::Continue(())
            }
        }

        let mut state = make_simulation_state();
        let result = run_simulation(&mut state, 2, &mut Warp).unwrap();

        let last = result.final_summary.unwrap();
        assert!((last.acceleration - 50.0).abs() < f64::EPSILON);
        assert!(last.blending);
    }
}
