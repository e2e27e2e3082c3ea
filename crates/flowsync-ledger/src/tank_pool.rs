//! Priority tank pool: which containers are drained or filled first.
//!
//! Containers are grouped into tiers by priority. Withdrawals walk the
//! tiers from the highest priority down, emptying each tier completely
//! before touching the next. Deposits walk from the lowest priority up,
//! filling each tier completely before moving on. Inside a tier the
//! quantity is split proportionally: by headroom for deposits, by amount
//! for withdrawals.
//!
//! # Arena
//!
//! A pool is rebuilt every tick, but its tiers are not freed. [`reset`]
//! rewinds a cursor to zero and keeps every tier (and its member buffer)
//! allocated; the next [`register`] calls reuse them. The tier buffer only
//! ever grows.
//!
//! Members are stored as indices into the container slice the caller
//! passes to [`apply_delta`], so the pool itself holds no borrows and can
//! live inside the ledger across ticks.
//!
//! [`reset`]: TankPool::reset
//! [`register`]: TankPool::register
//! [`apply_delta`]: TankPool::apply_delta

use crate::ContainerRef;

/// Priority used for every container when priority-aware flow is disabled.
pub const DEFAULT_PRIORITY: i32 = 1;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Containers sharing one priority value.
#[derive(Debug, Default)]
struct TankTier {
    priority: i32,
    /// Indices into the caller's container slice.
    members: Vec<usize>,
    amount: f64,
    max_amount: f64,
}

impl TankTier {
    fn reset(&mut self, priority: i32) {
        self.priority = priority;
        self.members.clear();
        self.amount = 0.0;
        self.max_amount = 0.0;
    }

    fn headroom(&self) -> f64 {
        self.max_amount - self.amount
    }

    fn drain(&mut self, containers: &mut [&mut dyn ContainerRef]) {
        for &slot in &self.members {
            if let Some(container) = containers.get_mut(slot) {
                container.set_amount(0.0);
            }
        }
        self.amount = 0.0;
    }

    fn fill(&mut self, containers: &mut [&mut dyn ContainerRef]) {
        for &slot in &self.members {
            if let Some(container) = containers.get_mut(slot) {
                let max = container.max_amount();
                container.set_amount(max);
            }
        }
        self.amount = self.max_amount;
    }

    /// Apply a delta that fits inside this tier.
    fn apply(&mut self, delta: f64, containers: &mut [&mut dyn ContainerRef]) {
        if delta > 0.0 {
            let headroom = self.headroom();
            if headroom <= 0.0 {
                return;
            }
            for &slot in &self.members {
                if let Some(container) = containers.get_mut(slot) {
                    let amount = container.amount();
                    let max = container.max_amount();
                    let share = delta * (max - amount) / headroom;
                    container.set_amount(crate::clamp(amount + share, 0.0, max));
                }
            }
        } else {
            let total = self.amount;
            if total <= 0.0 {
                return;
            }
            for &slot in &self.members {
                if let Some(container) = containers.get_mut(slot) {
                    let amount = container.amount();
                    let max = container.max_amount();
                    let share = delta * amount / total;
                    container.set_amount(crate::clamp(amount + share, 0.0, max));
                }
            }
        }
        self.amount = crate::clamp(self.amount + delta, 0.0, self.max_amount);
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Priority-ordered set of tiers holding one resource on one vessel.
#[derive(Debug, Default)]
pub struct TankPool {
    /// Tiers sorted by ascending priority up to `active`; spare tiers after.
    tiers: Vec<TankTier>,
    /// Number of tiers in use this tick.
    active: usize,
    amount: f64,
    max_amount: f64,
}

impl TankPool {
    /// Create an empty pool.
    pub const fn new() -> Self {
        Self {
            tiers: Vec::new(),
            active: 0,
            amount: 0.0,
            max_amount: 0.0,
        }
    }

    /// Forget every registered container but keep tier storage allocated.
    pub fn reset(&mut self) {
        for tier in self.tiers.iter_mut().take(self.active) {
            tier.reset(0);
        }
        self.active = 0;
        self.amount = 0.0;
        self.max_amount = 0.0;
    }

    /// Sum of the amounts of every registered container.
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    /// Sum of the maximum amounts of every registered container.
    pub const fn max_amount(&self) -> f64 {
        self.max_amount
    }

    /// Number of tiers in use this tick.
    pub const fn tier_count(&self) -> usize {
        self.active
    }

    /// Number of tiers ever allocated, including spare ones.
    pub const fn allocated_tiers(&self) -> usize {
        self.tiers.len()
    }

    /// Amount currently held by the tier at `priority`, if it exists.
    pub fn tier_amount(&self, priority: i32) -> Option<f64> {
        self.active_tiers()
            .binary_search_by(|tier| tier.priority.cmp(&priority))
            .ok()
            .and_then(|pos| self.tiers.get(pos))
            .map(|tier| tier.amount)
    }

    /// Add the container at index `slot` of the container slice to the
    /// tier for `priority`, creating the tier if needed.
    pub fn register(&mut self, slot: usize, container: &dyn ContainerRef, priority: i32) {
        let pos = match self
            .active_tiers()
            .binary_search_by(|tier| tier.priority.cmp(&priority))
        {
            Ok(pos) => pos,
            Err(pos) => self.insert_tier(pos, priority),
        };

        let amount = container.amount();
        let max_amount = container.max_amount();
        if let Some(tier) = self.tiers.get_mut(pos) {
            tier.members.push(slot);
            tier.amount += amount;
            tier.max_amount += max_amount;
        }
        self.amount += amount;
        self.max_amount += max_amount;
    }

    /// Distribute a signed quantity across the tiers.
    ///
    /// `delta` must already lie in `[-amount, max_amount - amount]`; the
    /// pool does not clamp it again. `containers` must be the same slice
    /// whose indices were passed to [`register`](Self::register).
    pub fn apply_delta(&mut self, delta: f64, containers: &mut [&mut dyn ContainerRef]) {
        let active = self.active;
        let Some(tiers) = self.tiers.get_mut(..active) else {
            return;
        };

        if delta < 0.0 {
            let mut need = -delta;
            for tier in tiers.iter_mut().rev() {
                if tier.amount < need {
                    need -= tier.amount;
                    tier.drain(containers);
                } else {
                    tier.apply(-need, containers);
                    break;
                }
            }
        } else if delta > 0.0 {
            let mut remaining = delta;
            for tier in tiers.iter_mut() {
                let headroom = tier.headroom();
                if headroom < remaining {
                    remaining -= headroom;
                    tier.fill(containers);
                } else {
                    tier.apply(remaining, containers);
                    break;
                }
            }
        }

        self.amount = crate::clamp(self.amount + delta, 0.0, self.max_amount);
    }

    fn active_tiers(&self) -> &[TankTier] {
        self.tiers.get(..self.active).unwrap_or_default()
    }

    /// Open a tier for `priority` at sorted position `pos`, reusing a spare
    /// tier from the tail of the buffer when one exists.
    fn insert_tier(&mut self, pos: usize, priority: i32) -> usize {
        if self.tiers.len() <= self.active {
            self.tiers.push(TankTier::default());
        }
        if let Some(window) = self.tiers.get_mut(pos..=self.active) {
            window.rotate_right(1);
        }
        if let Some(tier) = self.tiers.get_mut(pos) {
            tier.reset(priority);
        }
        self.active = self.active.saturating_add(1);
        pos
    }
}
