// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Drives a [`VelocityBins`] instance over a seeded particle scene.
//!
//! Every step aggregates per-bin maxima in parallel with rayon, asks the
//! trigger whether the broad phase must be rebuilt, and restratifies when it
//! does. Bodies spawned mid-run have no bin yet; the aggregation reports them
//! and the harness forces a rebuild so they get classified.

use std::fmt;

use anyhow::{Context, Result};
use echo_velocity_bins::{max_vel_sq, BinsConfig, BinsError, VelocityBins};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::prng::Prng;
use crate::scene::{Scene, SceneParams};

/// Scene size and integration settings for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    /// Initial number of particles.
    pub bodies: usize,
    /// Simulation steps after the initial rebuild.
    pub steps: usize,
    /// Time step.
    pub dt: f64,
    /// Reference sweep length handed to every rebuild.
    pub sweep_length: f64,
    /// Scene seed.
    pub seed: u64,
    /// Spawn one particle every `n` steps.
    pub spawn_every: Option<usize>,
    /// Scene generation parameters.
    pub scene: SceneParams,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            bodies: 1000,
            steps: 2000,
            dt: 1e-3,
            sweep_length: 0.05,
            seed: 42,
            spawn_every: None,
            scene: SceneParams::default(),
        }
    }
}

/// Final state of one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSummary {
    /// Bin index (0 = fastest).
    pub index: usize,
    /// Bodies in the bin after the last rebuild.
    pub n_bodies: usize,
    /// Lower velocity bound.
    pub min_vel: f64,
    /// Upper velocity bound.
    pub max_vel: f64,
    /// Displacement budget.
    pub max_dist: f64,
}

/// Outcome of [`run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Steps simulated.
    pub steps: usize,
    /// Rebuilds performed, including the initial one.
    pub rebuilds: usize,
    /// Rebuilds caused by newly spawned bodies rather than the trigger.
    pub forced_rebuilds: usize,
    /// Rebuilds per step.
    pub rebuild_ratio: f64,
    /// Particles at the end of the run.
    pub bodies: usize,
    /// Steps counted by the bins' own clock.
    pub clock: u64,
    /// Reference velocity after the last rebuild.
    pub ref_max_vel: Option<f64>,
    /// Bin layout after the last rebuild.
    pub bins: Vec<BinSummary>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} steps, {} bodies: {} rebuilds ({} forced), ratio {:.4}",
            self.steps, self.bodies, self.rebuilds, self.forced_rebuilds, self.rebuild_ratio
        )?;
        if let Some(v) = self.ref_max_vel {
            writeln!(f, "refMaxVel={v}")?;
        }
        for bin in &self.bins {
            writeln!(
                f,
                "\t{}: ({}) {}…{} maxDist={}",
                bin.index, bin.n_bodies, bin.min_vel, bin.max_vel, bin.max_dist
            )?;
        }
        Ok(())
    }
}

/// Runs the scene for `opts.steps` steps.
///
/// # Errors
/// Fails if `config` is invalid or the bins reject a rebuild.
pub fn run(config: BinsConfig, opts: &RunOptions) -> Result<RunSummary> {
    let mut bins = VelocityBins::try_new(config).context("invalid bins configuration")?;
    let mut prng = Prng::from_seed_u64(opts.seed);
    let mut scene = Scene::random(opts.scene, opts.bodies, &mut prng);

    rebuild(&mut bins, &scene.speeds_sq(), opts.sweep_length).context("initial rebuild")?;
    let mut rebuilds = 1;
    let mut forced_rebuilds = 0;

    for step in 1..=opts.steps {
        if opts.spawn_every.is_some_and(|n| n > 0 && step % n == 0) {
            let body = scene.spawn(&mut prng);
            debug!(step, body, "spawned body");
        }
        scene.advance(opts.dt, &mut prng);
        let speeds = scene.speeds_sq();

        bins.bin_vel_sq_initialize();
        let aggregated = speeds
            .par_iter()
            .enumerate()
            .try_for_each(|(body, &v)| bins.bin_vel_sq_use(body, v));
        bins.bin_vel_sq_finalize();

        let due = match aggregated {
            Ok(()) => bins.increment_dists_should_collide(opts.dt),
            Err(BinsError::UnassignedBody { body }) => {
                debug!(step, body, "unclassified body, forcing rebuild");
                // Keeps the bins' step clock in line with the simulation; the
                // accumulated distances are discarded by the rebuild below.
                bins.increment_dists_should_collide(opts.dt);
                forced_rebuilds += 1;
                true
            }
            Err(err) => return Err(err).with_context(|| format!("aggregation at step {step}")),
        };
        if due {
            rebuild(&mut bins, &speeds, opts.sweep_length)
                .with_context(|| format!("rebuild at step {step}"))?;
            rebuilds += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let rebuild_ratio = rebuilds as f64 / opts.steps.max(1) as f64;
    info!(steps = opts.steps, rebuilds, forced_rebuilds, "run complete");
    Ok(summarize(&bins, opts.steps, rebuilds, forced_rebuilds, rebuild_ratio))
}

fn rebuild(bins: &mut VelocityBins, speeds: &[f64], sweep_length: f64) -> Result<(), BinsError> {
    bins.set_bins(speeds, max_vel_sq(speeds), sweep_length)
        .map(|_| ())
}

fn summarize(
    bins: &VelocityBins,
    steps: usize,
    rebuilds: usize,
    forced_rebuilds: usize,
    rebuild_ratio: f64,
) -> RunSummary {
    let hist = bins.histogram();
    let layout = hist
        .rows
        .iter()
        .zip(bins.bins())
        .map(|(row, bin)| BinSummary {
            index: row.index,
            n_bodies: row.n_bodies,
            min_vel: row.min_vel,
            max_vel: row.max_vel,
            max_dist: bin.max_dist(),
        })
        .collect();
    RunSummary {
        steps,
        rebuilds,
        forced_rebuilds,
        rebuild_ratio,
        bodies: hist.total_bodies,
        clock: bins.step(),
        ref_max_vel: hist.ref_max_vel,
        bins: layout,
    }
}
