//! Simulation clock with time acceleration.
//!
//! The clock is the single source of truth for simulated time. Each tick
//! covers `tick_seconds * acceleration` simulated seconds. Acceleration can
//! be changed by the driver or capped by the coherency guard.
//!
//! # Blending
//!
//! A tick right after an acceleration change spans two regimes, so rates
//! measured over it are meaningless. After every change the next
//! `blending_ticks` ticks are flagged as blended and ledgers keep their
//! previous rates through them.

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid time configuration (e.g. a zero-length tick).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Simulation clock tracking tick count, simulated time, and acceleration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    /// Current tick number (0 before the first tick).
    tick: u64,

    /// Simulated seconds elapsed since tick 0.
    sim_time: f64,

    /// Simulated seconds per tick at 1x.
    tick_seconds: f64,

    /// Acceleration requested by the driver.
    requested: f64,

    /// Cap applied by the coherency guard.
    cap: Option<f64>,

    /// Ticks flagged as blended after a change.
    blending_ticks: u32,

    /// Blended ticks still pending.
    blending_left: u32,

    /// Whether the current tick is blended.
    blending: bool,
}

impl SimClock {
    /// Create a clock from a time configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_seconds` is not
    /// positive or `acceleration` is below 1.
    pub fn new(config: &TimeConfig) -> Result<Self, ClockError> {
        if !(config.tick_seconds.is_finite() && config.tick_seconds > 0.0) {
            return Err(ClockError::InvalidConfig {
                reason: format!("tick_seconds must be positive, got {}", config.tick_seconds),
            });
        }
        check_acceleration(config.acceleration)?;
        Ok(Self {
            tick: 0,
            sim_time: 0.0,
            tick_seconds: config.tick_seconds,
            requested: config.acceleration,
            cap: None,
            blending_ticks: config.blending_ticks,
            blending_left: 0,
            blending: false,
        })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.blending = self.blending_left > 0;
        self.blending_left = self.blending_left.saturating_sub(1);
        self.sim_time += self.elapsed();
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed since tick 0.
    pub const fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Simulated seconds covered by one tick at the current acceleration.
    pub fn elapsed(&self) -> f64 {
        self.tick_seconds * self.acceleration()
    }

    /// Effective acceleration: the requested value, capped by the guard.
    pub fn acceleration(&self) -> f64 {
        self.cap.map_or(self.requested, |cap| self.requested.min(cap))
    }

    /// Current cap, if the guard has throttled the clock.
    pub const fn cap(&self) -> Option<f64> {
        self.cap
    }

    /// Whether the current tick is blended.
    pub const fn is_blending(&self) -> bool {
        self.blending
    }

    /// Request a new acceleration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `acceleration` is below 1 or
    /// not finite.
    pub fn set_acceleration(&mut self, acceleration: f64) -> Result<(), ClockError> {
        check_acceleration(acceleration)?;
        let before = self.acceleration();
        self.requested = acceleration;
        self.on_change(before);
        Ok(())
    }

    /// Cap the acceleration at `max`. Returns whether the effective
    /// acceleration dropped.
    ///
    /// Caps only tighten; a looser cap than the current one is ignored.
    pub fn throttle(&mut self, max: f64) -> bool {
        if !(max.is_finite() && max >= 1.0) {
            return false;
        }
        let before = self.acceleration();
        self.cap = Some(self.cap.map_or(max, |cap| cap.min(max)));
        self.on_change(before)
    }

    /// Remove the guard's cap.
    pub fn release_throttle(&mut self) {
        let before = self.acceleration();
        self.cap = None;
        self.on_change(before);
    }

    fn on_change(&mut self, before: f64) -> bool {
        let changed = (self.acceleration() - before).abs() > f64::EPSILON;
        if changed {
            self.blending_left = self.blending_ticks;
        }
        changed
    }
}

fn check_acceleration(acceleration: f64) -> Result<(), ClockError> {
    if acceleration.is_finite() && acceleration >= 1.0 {
        Ok(())
    } else {
        Err(ClockError::InvalidConfig {
            reason: format!("acceleration must be at least 1, got {acceleration}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(acceleration: f64, blending_ticks: u32) -> TimeConfig {
        TimeConfig {
            tick_seconds: 0.5,
            acceleration,
            blending_ticks,
            max_ticks: 0,
        }
    }

    fn clock(acceleration: f64, blending_ticks: u32) -> SimClock {
        SimClock::new(&config(acceleration, blending_ticks))
            .unwrap()
    }

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = clock(1.0, 0);
        assert_eq!(clock.tick(), 0);
        assert!(clock.sim_time().abs() < f64::EPSILON);
        assert!(!clock.is_blending());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut bad = config(1.0, 0);
        bad.tick_seconds = 0.0;
        assert!(SimClock::new(&bad).is_err());
        assert!(SimClock::new(&config(0.5, 0)).is_err());
        assert!(SimClock::new(&config(f64::INFINITY, 0)).is_err());
    }

    #[test]
    fn advance_accumulates_accelerated_time() {
        let mut clock = clock(4.0, 0);
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert!((clock.elapsed() - 2.0).abs() < f64::EPSILON);
        assert!((clock.sim_time() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut clock = clock(1.0, 0);
        clock.tick = u64::MAX;
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
    }

    #[test]
    fn acceleration_change_blends_the_next_ticks() {
        let mut clock = clock(1.0, 2);
        clock.advance().unwrap();
        assert!(!clock.is_blending());

        clock.set_acceleration(10.0).unwrap();
        clock.advance().unwrap();
        assert!(clock.is_blending());
        clock.advance().unwrap();
        assert!(clock.is_blending());
        clock.advance().unwrap();
        assert!(!clock.is_blending());
    }

    #[test]
    fn same_acceleration_does_not_blend() {
        let mut clock = clock(10.0, 2);
        clock.set_acceleration(10.0).unwrap();
        clock.advance().unwrap();
        assert!(!clock.is_blending());
    }

    #[test]
    fn throttle_caps_and_only_tightens() {
        let mut clock = clock(100_000.0, 1);

        assert!(clock.throttle(100.0));
        assert!((clock.acceleration() - 100.0).abs() < f64::EPSILON);
        assert!(!clock.throttle(1000.0));
        assert_eq!(clock.cap(), Some(100.0));
        assert!(!clock.throttle(0.0));

        // Requests above the cap stay capped.
        clock.set_acceleration(50_000.0).unwrap();
        assert!((clock.acceleration() - 100.0).abs() < f64::EPSILON);

        clock.release_throttle();
        assert!((clock.acceleration() - 50_000.0).abs() < f64::EPSILON);
    }
}
