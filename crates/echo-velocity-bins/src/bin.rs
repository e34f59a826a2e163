// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A single speed bucket and its displacement budget.

use crate::aggregate::AtomicVelSq;

/// One speed range with its own displacement budget.
///
/// Invariants after [`crate::VelocityBins::set_bins`]:
/// - membership range is `[min_vel_sq, max_vel_sq)` (bin 0 is open upwards,
///   the last bin's minimum is `0`);
/// - `curr_dist_sq` accumulates only until the next `set_bins`.
#[derive(Debug, Default)]
pub struct Bin {
    pub(crate) bin_min_vel_sq: f64,
    pub(crate) bin_max_vel_sq: f64,
    pub(crate) max_dist: f64,
    pub(crate) curr_dist_sq: f64,
    pub(crate) curr_max_vel_sq: AtomicVelSq,
    pub(crate) n_bodies: usize,
}

impl Bin {
    /// Lower squared-velocity bound for membership.
    pub fn min_vel_sq(&self) -> f64 {
        self.bin_min_vel_sq
    }

    /// Upper squared-velocity bound for membership.
    pub fn max_vel_sq(&self) -> f64 {
        self.bin_max_vel_sq
    }

    /// Largest cumulative displacement members may make between rebuilds.
    pub fn max_dist(&self) -> f64 {
        self.max_dist
    }

    /// Accumulated squared worst-case displacement since the last rebuild.
    pub fn curr_dist_sq(&self) -> f64 {
        self.curr_dist_sq
    }

    /// Peak squared velocity reported for members during the current step.
    pub fn curr_max_vel_sq(&self) -> f64 {
        self.curr_max_vel_sq.get()
    }

    /// Number of bodies assigned at the last rebuild.
    pub fn n_bodies(&self) -> usize {
        self.n_bodies
    }

    /// Whether the accumulated displacement exceeds the budget.
    pub fn is_over_budget(&self) -> bool {
        self.curr_dist_sq > self.max_dist * self.max_dist
    }

    /// Recomputes geometry and clears every counter.
    pub(crate) fn reset(&mut self, min_vel_sq: f64, max_vel_sq: f64, max_dist: f64) {
        self.bin_min_vel_sq = min_vel_sq;
        self.bin_max_vel_sq = max_vel_sq;
        self.max_dist = max_dist;
        self.curr_dist_sq = 0.0;
        self.curr_max_vel_sq.reset();
        self.n_bodies = 0;
    }
}
