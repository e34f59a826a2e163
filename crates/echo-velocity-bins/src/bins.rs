// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Velocity-stratified broad-phase rebuild trigger.
//!
//! Per simulation step the host drives:
//!
//! 1. [`VelocityBins::bin_vel_sq_initialize`], then [`VelocityBins::bin_vel_sq_use`]
//!    for every body (from any number of threads), then
//!    [`VelocityBins::bin_vel_sq_finalize`];
//! 2. [`VelocityBins::increment_dists_should_collide`];
//! 3. if that returned `true`: run the real broad phase, then
//!    [`VelocityBins::set_bins`] to restratify for the next interval.

use tracing::{debug, enabled, error, info, trace, Level};

use crate::aggregate::{bin_index, sanitize, VelSqPartial};
use crate::bin::Bin;
use crate::config::BinsConfig;
use crate::error::BinsError;
use crate::histogram::{BinHistogram, HistogramThrottle, RebinStats};
use crate::velocity::BodyVelocities;

/// Speed-ordered bins with per-bin displacement budgets and the body→bin map.
///
/// One instance lives for a whole simulation run; it owns all of its state.
#[derive(Debug)]
pub struct VelocityBins {
    config: BinsConfig,
    bins: Vec<Bin>,
    body_bins: Vec<Option<usize>>,
    ref_max_vel_sq: Option<f64>,
    last_moves: RebinStats,
    step: u64,
    throttle: HistogramThrottle,
    scratch: Vec<Option<usize>>,
}

/// Geometry of one bin before it is committed.
#[derive(Debug, Clone, Copy)]
struct Rung {
    min_vel_sq: f64,
    max_vel_sq: f64,
    max_dist: f64,
}

impl Default for VelocityBins {
    fn default() -> Self {
        Self::new(BinsConfig::default())
    }
}

impl VelocityBins {
    /// Creates an empty instance; the configuration is checked on the first
    /// [`Self::set_bins`].
    pub fn new(config: BinsConfig) -> Self {
        Self {
            config,
            bins: Vec::new(),
            body_bins: Vec::new(),
            ref_max_vel_sq: None,
            last_moves: RebinStats::default(),
            step: 0,
            throttle: HistogramThrottle::default(),
            scratch: Vec::new(),
        }
    }

    /// Creates an instance after validating (and correcting) `config`.
    pub fn try_new(mut config: BinsConfig) -> Result<Self, BinsError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Seeds the reference squared velocity instead of adopting the first
    /// observed maximum. Negative or NaN seeds leave the reference unset.
    #[must_use]
    pub fn with_ref_max_vel_sq(mut self, ref_max_vel_sq: f64) -> Self {
        self.ref_max_vel_sq = (ref_max_vel_sq >= 0.0).then_some(ref_max_vel_sq);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &BinsConfig {
        &self.config
    }

    /// Mutable configuration; changes take effect on the next [`Self::set_bins`].
    pub fn config_mut(&mut self) -> &mut BinsConfig {
        &mut self.config
    }

    /// Bins, fastest first. Empty before the first [`Self::set_bins`].
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Bin currently holding `body`, if classified.
    pub fn bin_of(&self, body: usize) -> Option<usize> {
        self.body_bins.get(body).copied().flatten()
    }

    /// Body→bin map indexed by body id (`None` = not yet classified).
    pub fn body_bins(&self) -> &[Option<usize>] {
        &self.body_bins
    }

    /// Smoothed reference squared velocity, `None` until the first rebuild.
    pub fn ref_max_vel_sq(&self) -> Option<f64> {
        self.ref_max_vel_sq
    }

    /// Number of [`Self::increment_dists_should_collide`] calls so far.
    ///
    /// This is the clock the histogram throttle runs on; hosts that skip the
    /// trigger on some steps should still call it to keep the clock honest.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Population histogram as of the last rebuild.
    pub fn histogram(&self) -> BinHistogram {
        BinHistogram::capture(
            &self.bins,
            self.body_bins.len(),
            self.last_moves,
            self.ref_max_vel_sq,
        )
    }

    /// Recomputes bin geometry and reassigns every body.
    ///
    /// Call right after each real broad-phase rebuild. `curr_max_vel_sq` is
    /// the largest squared velocity over all bodies and `ref_sweep_length` the
    /// margin by which bounding volumes are enlarged (its sign is ignored).
    ///
    /// A body may move to any faster bin, but to at most one bin slower per
    /// call; a body already in a bin stays there while its squared velocity is
    /// above `bin_overlap²` times the bin's minimum. Negative squared
    /// velocities count as zero.
    ///
    /// On error nothing but the `bin_overlap` correction is applied: the
    /// reference, the bins and the body→bin map keep their previous state.
    pub fn set_bins<B>(
        &mut self,
        bodies: &B,
        curr_max_vel_sq: f64,
        ref_sweep_length: f64,
    ) -> Result<RebinStats, BinsError>
    where
        B: BodyVelocities + ?Sized,
    {
        self.config.validate()?;
        let ref_max_vel_sq = self.next_reference(curr_max_vel_sq);
        let ladder = self.ladder(curr_max_vel_sq, ref_max_vel_sq, ref_sweep_length.abs());
        let mut assigned = std::mem::take(&mut self.scratch);
        let (counts, moves) = self.classify(bodies, &ladder, &mut assigned)?;

        let n_bins = ladder.len();
        if self.bins.len() != n_bins {
            info!(n_bins, "New number of bins");
            self.bins.resize_with(n_bins, Bin::default);
        }
        for ((bin, rung), n_bodies) in self.bins.iter_mut().zip(&ladder).zip(counts) {
            bin.reset(rung.min_vel_sq, rung.max_vel_sq, rung.max_dist);
            bin.n_bodies = n_bodies;
        }
        std::mem::swap(&mut self.body_bins, &mut assigned);
        self.scratch = assigned;
        trace!(ref_max_vel = ref_max_vel_sq.sqrt(), "new refMaxVel");
        self.ref_max_vel_sq = Some(ref_max_vel_sq);
        self.last_moves = moves;
        self.report(moves);
        Ok(moves)
    }

    /// Reference smoothed towards `curr_max_vel_sq`, bounded per call by the
    /// squared relative step.
    #[allow(clippy::float_cmp)]
    fn next_reference(&self, curr_max_vel_sq: f64) -> f64 {
        match self.ref_max_vel_sq {
            None => curr_max_vel_sq,
            Some(prev) => {
                let step = self.config.max_ref_rel_step;
                let floor = prev * (1.0 - step).powi(2);
                let ceil = prev * (1.0 + step).powi(2);
                let bounded = floor.max(curr_max_vel_sq).min(ceil);
                if bounded == 0.0 {
                    curr_max_vel_sq
                } else {
                    bounded
                }
            }
        }
    }

    /// Geometric ladder: squared limits shrink by `bin_coeff²`, budgets by
    /// `bin_coeff` per bin. Bin 0 is anchored at the instantaneous maximum.
    #[allow(clippy::float_cmp)]
    fn ladder(&self, curr_max_vel_sq: f64, ref_max_vel_sq: f64, sweep: f64) -> Vec<Rung> {
        let n_bins = self.config.n_bins;
        let coeff = self.config.bin_coeff;
        let coeff_sq = coeff * coeff;
        let last = n_bins.saturating_sub(1);
        (0..n_bins)
            .map(|i| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let exp = i as i32;
                let max_vel_sq = if i == 0 {
                    curr_max_vel_sq
                } else {
                    ref_max_vel_sq / coeff_sq.powi(exp)
                };
                let min_vel_sq = if i == last {
                    0.0
                } else {
                    ref_max_vel_sq / coeff_sq.powi(exp + 1)
                };
                let max_dist = if i == 0 {
                    if ref_max_vel_sq == 0.0 {
                        0.0
                    } else {
                        (curr_max_vel_sq / ref_max_vel_sq).sqrt() * sweep
                    }
                } else {
                    sweep / coeff.powi(exp)
                };
                Rung {
                    min_vel_sq,
                    max_vel_sq,
                    max_dist,
                }
            })
            .collect()
    }

    /// Assigns every body to the fastest rung that accepts it, writing the
    /// new map into `assigned`. Returns per-rung populations and move counts.
    fn classify<B>(
        &self,
        bodies: &B,
        ladder: &[Rung],
        assigned: &mut Vec<Option<usize>>,
    ) -> Result<(Vec<usize>, RebinStats), BinsError>
    where
        B: BodyVelocities + ?Sized,
    {
        let overlap_sq = self.config.bin_overlap * self.config.bin_overlap;
        let mut counts = vec![0; ladder.len()];
        let mut moves = RebinStats::default();
        assigned.clear();
        for body in 0..bodies.body_count() {
            let raw = bodies.vel_sq(body);
            if raw.is_nan() {
                error!(body, vel_sq = raw, "body not put in any bin");
                return Err(BinsError::UnclassifiedBody { body, vel_sq: raw });
            }
            let vel_sq = raw.max(0.0);
            let old = self.bin_of(body);
            let accepts = |i: usize, rung: &Rung| {
                let slowed_by_one = i > 0 && old == Some(i - 1);
                let threshold = if old == Some(i) {
                    rung.min_vel_sq * overlap_sq
                } else {
                    rung.min_vel_sq
                };
                slowed_by_one || vel_sq >= threshold
            };
            let Some(new) = ladder
                .iter()
                .enumerate()
                .position(|(i, rung)| accepts(i, rung))
            else {
                error!(body, vel_sq = raw, "body not put in any bin");
                return Err(BinsError::UnclassifiedBody { body, vel_sq: raw });
            };
            match old {
                Some(old) if new > old => moves.moved_slower += 1,
                Some(old) if new < old => moves.moved_faster += 1,
                _ => {}
            }
            assigned.push(Some(new));
            counts[new] += 1;
        }
        Ok((counts, moves))
    }

    fn report(&mut self, moves: RebinStats) {
        if !enabled!(Level::DEBUG) {
            return;
        }
        if !self.throttle.admit(self.step, self.config.hist_interval) {
            return;
        }
        let hist = self.histogram();
        debug!("{}", hist.summary());
        for row in &hist.rows {
            debug!("{}", hist.row_line(row));
        }
        debug!(
            moved_faster = moves.moved_faster,
            moved_slower = moves.moved_slower,
            "rebin complete"
        );
    }

    /// Advances every bin's worst-case displacement by one step of `dt` and
    /// reports whether the broad phase must be rebuilt.
    ///
    /// Each bin accumulates `dt² · curr_max_vel_sq`. Returns `true` as soon as
    /// one bin exceeds `max_dist²`; later bins are not advanced in that call.
    pub fn increment_dists_should_collide(&mut self, dt: f64) -> bool {
        self.step += 1;
        let dt_sq = dt * dt;
        for (i, bin) in self.bins.iter_mut().enumerate() {
            bin.curr_dist_sq += dt_sq * bin.curr_max_vel_sq.get();
            if bin.is_over_budget() {
                trace!(
                    bin = i,
                    max_dist = bin.max_dist,
                    curr_dist = bin.curr_dist_sq.sqrt(),
                    "Collide"
                );
                return true;
            }
        }
        false
    }

    /// Clears every bin's per-step maximum squared velocity.
    pub fn bin_vel_sq_initialize(&mut self) {
        for bin in &mut self.bins {
            bin.curr_max_vel_sq.reset();
        }
    }

    /// Raises the per-step maximum of the bin holding `body` to `vel_sq`.
    ///
    /// Lock-free; may be called concurrently for any bodies. Negative values
    /// count as zero.
    pub fn bin_vel_sq_use(&self, body: usize, vel_sq: f64) -> Result<(), BinsError> {
        let vel_sq = sanitize(body, vel_sq)?;
        let bin = bin_index(&self.body_bins, body)?;
        if let Some(bin) = self.bins.get(bin) {
            bin.curr_max_vel_sq.raise(vel_sq);
        }
        Ok(())
    }

    /// Closes the per-step aggregation window.
    ///
    /// Taking `&mut self` guarantees every worker borrow (and every
    /// [`VelSqPartial`]) has ended before the trigger reads the maxima.
    pub fn bin_vel_sq_finalize(&mut self) {
        if enabled!(Level::TRACE) {
            for (i, bin) in self.bins.iter().enumerate() {
                trace!(bin = i, max_vel = bin.curr_max_vel_sq().sqrt(), "step maxima");
            }
        }
    }

    /// Starts a worker-private aggregation buffer.
    pub fn partial(&self) -> VelSqPartial<'_> {
        VelSqPartial::new(&self.body_bins, self.bins.len())
    }

    /// Folds a worker's buffer into the shared per-bin maxima.
    pub fn merge_partial(&self, partial: VelSqPartial<'_>) {
        for (bin, vel_sq) in self.bins.iter().zip(partial.into_maxima()) {
            bin.curr_max_vel_sq.raise(vel_sq);
        }
    }

    /// Aggregates `vel_sq[body]` for every body on `workers` scoped threads,
    /// each filling a private [`VelSqPartial`] over a contiguous chunk.
    ///
    /// Returns the first error any worker hit; maxima from successful workers
    /// are still merged.
    pub fn aggregate_parallel(&self, vel_sq: &[f64], workers: usize) -> Result<(), BinsError> {
        let workers = workers.clamp(1, vel_sq.len().max(1));
        let chunk = vel_sq.len().div_ceil(workers).max(1);
        let results: Vec<Result<(), BinsError>> = std::thread::scope(|s| {
            let handles: Vec<_> = vel_sq
                .chunks(chunk)
                .enumerate()
                .map(|(n, speeds)| {
                    s.spawn(move || {
                        let base = n * chunk;
                        let mut partial = self.partial();
                        let mut outcome = Ok(());
                        for (offset, &v) in speeds.iter().enumerate() {
                            if let Err(e) = partial.use_body(base + offset, v) {
                                outcome = Err(e);
                                break;
                            }
                        }
                        self.merge_partial(partial);
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(res) => res,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        results.into_iter().collect()
    }
}
