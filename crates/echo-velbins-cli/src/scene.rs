// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Free particles in a periodic box.
//!
//! Most particles drift slowly; a small fraction start fast, and random kicks
//! keep reshuffling who is fast. Damping slowly bleeds energy so kicked
//! particles drift back down through the bins.

use rayon::prelude::*;

use crate::prng::Prng;

/// Scene generation and integration parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneParams {
    /// Edge length of the periodic box.
    pub box_size: f64,
    /// Speed range of the slow majority.
    pub slow_speed: f64,
    /// Speed range of the fast minority.
    pub fast_speed: f64,
    /// Fraction of particles that start fast.
    pub fast_fraction: f64,
    /// Per-particle, per-step probability of a random kick.
    pub kick_probability: f64,
    /// Relative velocity loss per unit time.
    pub damping: f64,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            box_size: 10.0,
            slow_speed: 0.1,
            fast_speed: 5.0,
            fast_fraction: 0.05,
            kick_probability: 1e-3,
            damping: 0.5,
        }
    }
}

/// Particle positions and velocities.
#[derive(Debug, Clone)]
pub struct Scene {
    params: SceneParams,
    positions: Vec<[f64; 3]>,
    velocities: Vec<[f64; 3]>,
}

impl Scene {
    /// Draws `bodies` particles from `prng`.
    pub fn random(params: SceneParams, bodies: usize, prng: &mut Prng) -> Self {
        let mut scene = Self {
            params,
            positions: Vec::with_capacity(bodies),
            velocities: Vec::with_capacity(bodies),
        };
        for _ in 0..bodies {
            scene.spawn(prng);
        }
        scene
    }

    /// Adds one particle; returns its body id.
    pub fn spawn(&mut self, prng: &mut Prng) -> usize {
        let p = &self.params;
        let position = [
            prng.next_range(0.0, p.box_size),
            prng.next_range(0.0, p.box_size),
            prng.next_range(0.0, p.box_size),
        ];
        let top = if prng.chance(p.fast_fraction) {
            p.fast_speed
        } else {
            p.slow_speed
        };
        let speed = prng.next_range(0.0, top);
        let [dx, dy, dz] = prng.unit_vector();
        self.positions.push(position);
        self.velocities.push([dx * speed, dy * speed, dz * speed]);
        self.positions.len() - 1
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Linear velocities, indexed by body id.
    pub fn velocities(&self) -> &[[f64; 3]] {
        &self.velocities
    }

    /// Applies random kicks, damps, and moves every particle by `dt`.
    pub fn advance(&mut self, dt: f64, prng: &mut Prng) {
        let p = self.params;
        for v in &mut self.velocities {
            if prng.chance(p.kick_probability) {
                let [dx, dy, dz] = prng.unit_vector();
                let dv = prng.next_range(0.0, p.fast_speed);
                v[0] += dx * dv;
                v[1] += dy * dv;
                v[2] += dz * dv;
            }
        }
        let keep = (1.0 - p.damping * dt).max(0.0);
        self.positions
            .par_iter_mut()
            .zip(self.velocities.par_iter_mut())
            .for_each(|(x, v)| {
                for axis in 0..3 {
                    v[axis] *= keep;
                    x[axis] = (x[axis] + v[axis] * dt).rem_euclid(p.box_size);
                }
            });
    }

    /// Squared speed of every particle, computed in parallel.
    pub fn speeds_sq(&self) -> Vec<f64> {
        self.velocities
            .par_iter()
            .map(|[x, y, z]| x * x + y * y + z * z)
            .collect()
    }
}
